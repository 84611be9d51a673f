pub mod redirect;
pub mod types;
pub mod urls;

pub use redirect::redirect_routes;
pub use urls::api_routes;
