// File: src/controllers/mod.rs
// Purpose: Blog controllers and the helpers they share

pub mod account;
pub mod status;

use crate::models::User;
use portico::{Controller, ControllerDef, DispatchError};

/// Session key holding the signed-in [`User`]
pub const USER_SESSION_KEY: &str = "user";

pub fn definitions() -> Vec<ControllerDef> {
    vec![account::definition(), status::definition()]
}

/// Posted form field, `""` when absent
fn form_value(c: &Controller, name: &str) -> String {
    c.request().post(name).cloned().unwrap_or_default()
}

/// The signed-in user; a session without one is treated as signed out
fn current_user(c: &Controller) -> Result<User, DispatchError> {
    c.session()
        .get::<User>(USER_SESSION_KEY)
        .ok_or(DispatchError::Unauthorized)
}

fn sign_in(c: &mut Controller, user: &User) {
    let session = c.session_mut();
    session.set_authenticated(true);
    session.set(USER_SESSION_KEY, user);
}
