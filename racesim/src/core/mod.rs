pub mod car;
pub mod driver;
pub mod handle_race;
pub mod qualifying;
pub mod race;
pub mod sim_constants;
pub mod state_handler;
pub mod tireset;
pub mod track;
