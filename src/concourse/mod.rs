mod client;
mod endpoints;

pub use client::ConcourseClient;
pub use endpoints::Page;
