pub mod bulk;
pub mod server_info;
