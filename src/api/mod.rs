mod handlers;
mod server;

pub use handlers::ResetForm;
pub use server::{router, ApiServer, ApiState};
