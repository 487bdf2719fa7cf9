use serde::{Serialize, Deserialize};

use crate::users::User;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registered {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyEmail {
    pub token: String,
}
