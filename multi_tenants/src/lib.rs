pub mod audit;
pub mod config;
pub mod context;
pub mod control_plane;
pub mod db;
pub mod error;
pub mod state;
pub mod tenant;
