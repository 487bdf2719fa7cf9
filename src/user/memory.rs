use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use acct_lib::{ids, user::{name_valid, normalize_email}};
use futures::future::BoxFuture;

use crate::time::Clock;

use super::{DirectoryError, User, UserDirectory};

#[derive(Debug, Default)]
struct Index {
    by_id: HashMap<ids::UserId, User>,
    by_email: HashMap<String, ids::UserId>,
    by_name: HashMap<String, ids::UserId>,
}

impl Index {
    fn insert(&mut self, user: User) {
        if !user.email.is_empty() {
            self.by_email.insert(user.email.clone(), user.id.clone());
        }

        self.by_name.insert(user.name.to_lowercase(), user.id.clone());
        self.by_id.insert(user.id.clone(), user);
    }

    fn remove_keys(&mut self, user: &User) {
        if !user.email.is_empty() {
            self.by_email.remove(&user.email);
        }

        self.by_name.remove(&user.name.to_lowercase());
    }

    /// true if the key is held by a user other than `id`
    fn taken(map: &HashMap<String, ids::UserId>, key: &str, id: &str) -> bool {
        map.get(key).map(|owner| owner != id).unwrap_or(false)
    }
}

/// in process user directory. one lock covers every index so uniqueness
/// checks and writes happen together
#[derive(Debug)]
pub struct MemoryDirectory {
    index: RwLock<Index>,
    clock: Arc<dyn Clock>,
}

impl MemoryDirectory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        tracing::debug!("creating MemoryDirectory");

        MemoryDirectory {
            index: RwLock::new(Index::default()),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Index> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn normalize(user: &mut User) -> Result<(), DirectoryError> {
        user.name = user.name.trim().to_owned();
        user.email = normalize_email(&user.email);

        if !name_valid(&user.name) {
            return Err(DirectoryError::InvalidName);
        }

        user.groups = std::mem::take(&mut user.groups)
            .into_iter()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .collect();
        user.permissions = std::mem::take(&mut user.permissions)
            .into_iter()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .collect();

        Ok(())
    }

    fn create_user(&self, mut user: User) -> Result<User, DirectoryError> {
        Self::normalize(&mut user)?;

        let mut index = self.write();

        if !user.email.is_empty() && index.by_email.contains_key(&user.email) {
            return Err(DirectoryError::EmailExists);
        }

        if index.by_name.contains_key(&user.name.to_lowercase()) {
            return Err(DirectoryError::NameExists);
        }

        if user.id.is_empty() || index.by_id.contains_key(&user.id) {
            user.id = ids::create_uid();

            while index.by_id.contains_key(&user.id) {
                user.id = ids::create_uid();
            }
        }

        let now = self.clock.now();
        user.created_at = now;
        user.updated_at = now;

        index.insert(user.clone());

        Ok(user)
    }

    fn update_user(&self, mut user: User) -> Result<User, DirectoryError> {
        Self::normalize(&mut user)?;

        let mut index = self.write();

        let Some(existing) = index.by_id.get(&user.id).cloned() else {
            return Err(DirectoryError::NotFound);
        };

        if !user.email.is_empty() && Index::taken(&index.by_email, &user.email, &user.id) {
            return Err(DirectoryError::EmailExists);
        }

        if Index::taken(&index.by_name, &user.name.to_lowercase(), &user.id) {
            return Err(DirectoryError::NameExists);
        }

        user.created_at = existing.created_at;
        user.updated_at = self.clock.now();

        index.remove_keys(&existing);
        index.insert(user.clone());

        Ok(user)
    }

    fn find_by(&self, key: &str, pick: fn(&Index) -> &HashMap<String, ids::UserId>) -> Result<User, DirectoryError> {
        let index = self.read();

        pick(&*index).get(key)
            .and_then(|id| index.by_id.get(id))
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }
}

impl UserDirectory for MemoryDirectory {
    fn create(&self, user: User) -> BoxFuture<'_, Result<User, DirectoryError>> {
        Box::pin(async move {
            self.create_user(user)
        })
    }

    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<User, DirectoryError>> {
        Box::pin(async move {
            self.read()
                .by_id
                .get(id.trim())
                .cloned()
                .ok_or(DirectoryError::NotFound)
        })
    }

    fn get_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<User, DirectoryError>> {
        Box::pin(async move {
            let key = normalize_email(email);

            if key.is_empty() {
                return Err(DirectoryError::NotFound);
            }

            self.find_by(&key, |index| &index.by_email)
        })
    }

    fn get_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<User, DirectoryError>> {
        Box::pin(async move {
            self.find_by(&name.trim().to_lowercase(), |index| &index.by_name)
        })
    }

    fn update(&self, user: User) -> BoxFuture<'_, Result<User, DirectoryError>> {
        Box::pin(async move {
            self.update_user(user)
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<User>, DirectoryError>> {
        Box::pin(async move {
            let mut users: Vec<User> = self.read()
                .by_id
                .values()
                .cloned()
                .collect();

            users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

            Ok(users)
        })
    }
}
