pub mod authn;
pub mod authz;
