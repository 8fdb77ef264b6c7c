// HTTP routes

pub mod compose_routes;
pub mod delivery_routes;
pub mod gallery_routes;
pub mod template_routes;

pub use compose_routes::*;
pub use delivery_routes::*;
pub use gallery_routes::*;
pub use template_routes::*;
