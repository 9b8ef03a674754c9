pub mod role_context;
