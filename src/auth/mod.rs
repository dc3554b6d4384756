pub mod callback;
pub mod token;

pub use callback::CallbackListener;
pub use token::{auth_url, TokenExchanger, AUTH_BASE_URL};
