//! # User Routes
//!
//! Account CRUD over the binary string codec. Failure responses follow
//! the original wire conventions: an empty body for "not found / bad
//! input", `DUP` for uniqueness collisions, and two-byte `OK`/`ER`
//! statuses for mutations.

use std::sync::Arc;

use cratefall_server::{Server, ServerError};

use crate::store::{RegisterOutcome, UserStore};
use crate::wire::{read_str, read_u32, write_str};

/// Registers `4`, `L`, `P`, `5`, `6`, `7`, and `U`.
///
/// # Errors
///
/// Propagates registration failures (reserved/colliding ids, started
/// server).
#[allow(clippy::too_many_lines)]
pub fn register_user_routes(server: &mut Server, store: Arc<UserStore>) -> Result<(), ServerError> {
    let register_store = Arc::clone(&store);
    server.register_command(
        b'4',
        "RegisterUser",
        0,
        "str:name|str:email|str:password",
        "u32:id|str:name|str:email",
        move |_conn, body| {
            let mut offset = 0;
            let name = read_str(body, &mut offset).unwrap_or_default();
            let email = read_str(body, &mut offset).unwrap_or_default();
            let password = read_str(body, &mut offset).unwrap_or_default();
            if name.is_empty() || email.is_empty() {
                tracing::warn!("registration rejected: missing name or email");
                return Vec::new();
            }

            match register_store.register(&name, &email, &password) {
                Ok(RegisterOutcome::Created { id }) => {
                    tracing::info!(id, email, "user registered");
                    let mut reply = id.to_le_bytes().to_vec();
                    write_str(&mut reply, &name);
                    write_str(&mut reply, &email);
                    reply
                }
                Ok(RegisterOutcome::Duplicate) => b"DUP".to_vec(),
                Err(err) => {
                    tracing::error!(%err, "registration failed");
                    Vec::new()
                }
            }
        },
    )?;

    let login_store = Arc::clone(&store);
    server.register_command(
        b'L',
        "Login",
        0,
        "str:email|str:password",
        "u32:id|str:name",
        move |_conn, body| {
            let mut offset = 0;
            let email = read_str(body, &mut offset).unwrap_or_default();
            let password = read_str(body, &mut offset).unwrap_or_default();

            match login_store.login(&email, &password) {
                Ok(Some((id, name))) => {
                    tracing::info!(id, email, "login succeeded");
                    let mut reply = id.to_le_bytes().to_vec();
                    write_str(&mut reply, &name);
                    reply
                }
                Ok(None) => {
                    tracing::info!(email, "login failed");
                    Vec::new()
                }
                Err(err) => {
                    tracing::error!(%err, "login query failed");
                    Vec::new()
                }
            }
        },
    )?;

    let password_store = Arc::clone(&store);
    server.register_command(
        b'P',
        "ChangePassword",
        2,
        "u32:id|str:old_pass|str:new_pass",
        "c2:status",
        move |_conn, body| {
            let mut offset = 0;
            let Some(id) = read_u32(body, &mut offset) else {
                return b"ER".to_vec();
            };
            let old_pass = read_str(body, &mut offset).unwrap_or_default();
            let new_pass = read_str(body, &mut offset).unwrap_or_default();

            match password_store.change_password(id, &old_pass, &new_pass) {
                Ok(true) => b"OK".to_vec(),
                Ok(false) | Err(_) => b"ER".to_vec(),
            }
        },
    )?;

    let get_store = Arc::clone(&store);
    server.register_command(
        b'5',
        "GetUser",
        0,
        "u32:id",
        "u32:id|str:name|str:email",
        move |_conn, body| {
            let mut offset = 0;
            let Some(id) = read_u32(body, &mut offset) else {
                return Vec::new();
            };
            match get_store.get(id) {
                Ok(Some((id, name, email))) => {
                    let mut reply = id.to_le_bytes().to_vec();
                    write_str(&mut reply, &name);
                    write_str(&mut reply, &email);
                    reply
                }
                Ok(None) => Vec::new(),
                Err(err) => {
                    tracing::error!(%err, "user lookup failed");
                    Vec::new()
                }
            }
        },
    )?;

    let update_store = Arc::clone(&store);
    server.register_command(
        b'6',
        "UpdateUser",
        2,
        "u32:id|str:name|str:email",
        "c2:status",
        move |_conn, body| {
            let mut offset = 0;
            let Some(id) = read_u32(body, &mut offset) else {
                return b"ER".to_vec();
            };
            let name = read_str(body, &mut offset).unwrap_or_default();
            let email = read_str(body, &mut offset).unwrap_or_default();

            match update_store.update(id, &name, &email) {
                Ok(_) => b"OK".to_vec(),
                Err(err) => {
                    tracing::error!(%err, "user update failed");
                    b"ER".to_vec()
                }
            }
        },
    )?;

    let delete_store = Arc::clone(&store);
    server.register_command(
        b'7',
        "DeleteUser",
        2,
        "u32:id",
        "c2:status",
        move |_conn, body| {
            let mut offset = 0;
            let Some(id) = read_u32(body, &mut offset) else {
                return b"ER".to_vec();
            };
            match delete_store.delete(id) {
                Ok(_) => b"OK".to_vec(),
                Err(err) => {
                    tracing::error!(%err, "user delete failed");
                    b"ER".to_vec()
                }
            }
        },
    )?;

    server.register_command(
        b'U',
        "ListUsers",
        0,
        "",
        "str:user_list",
        move |_conn, _body| match store.list() {
            Ok(listing) => {
                let mut reply = Vec::new();
                write_str(&mut reply, &listing);
                reply
            }
            Err(err) => {
                tracing::error!(%err, "user listing failed");
                Vec::new()
            }
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes a `RegisterUser` body and decodes the reply, exercising
    /// the wire conventions the handlers rely on.
    #[test]
    fn test_register_body_encoding_matches_store() {
        let store = UserStore::open_in_memory().unwrap();

        let mut body = Vec::new();
        write_str(&mut body, "ada");
        write_str(&mut body, "ada@example.com");
        write_str(&mut body, "pw");

        let mut offset = 0;
        let name = read_str(&body, &mut offset).unwrap();
        let email = read_str(&body, &mut offset).unwrap();
        let password = read_str(&body, &mut offset).unwrap();
        let outcome = store.register(&name, &email, &password).unwrap();
        assert!(matches!(outcome, RegisterOutcome::Created { .. }));
    }
}
