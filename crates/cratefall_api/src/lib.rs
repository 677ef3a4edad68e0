//! # Cratefall API
//!
//! The concrete endpoint set registered on the server core:
//!
//! | id  | kind    | endpoint           |
//! |-----|---------|--------------------|
//! | `1` | command | GetWeatherForecast |
//! | `2` | command | GetSystemStatus    |
//! | `3` | stream  | LiveTelemetry      |
//! | `4` | command | RegisterUser       |
//! | `L` | command | Login              |
//! | `P` | command | ChangePassword     |
//! | `5` | command | GetUser            |
//! | `6` | command | UpdateUser         |
//! | `7` | command | DeleteUser         |
//! | `U` | command | ListUsers          |
//! | `A` | command | GetAssets          |
//! | `E` | command | GetEntitiesInfo    |
//! | `J` | command | JoinGame           |
//! | `M` | command | MoveEntity         |
//! | `W` | stream  | WorldStream        |
//!
//! Fixed-width payloads are `bytemuck` Pod structs; variable strings use
//! the length-prefixed codec in [`wire`]. User data lives in SQLite
//! behind [`store::UserStore`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod game;
pub mod payloads;
pub mod store;
pub mod system;
pub mod users;
pub mod wire;

pub use game::register_game_routes;
pub use store::UserStore;
pub use system::register_system_routes;
pub use users::register_user_routes;
