mod builder;
mod controller;
mod links;

pub use builder::SessionControllerBuilder;
pub use controller::SessionController;
