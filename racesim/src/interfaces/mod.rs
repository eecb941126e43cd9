pub mod race_status;
