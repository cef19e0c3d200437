pub mod ipc_client;
mod worker;
