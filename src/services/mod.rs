pub mod access;
pub mod credentials;
pub mod init;
pub mod sharing;
pub mod tokens;
pub mod trips;
