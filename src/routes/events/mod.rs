mod handler;
mod model;

pub use handler::receive_message;
pub use model::MessageEventRequest;
