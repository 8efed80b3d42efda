mod decode;
mod locator;
mod value;

pub use decode::{decode, DecodeError, Format};
pub use locator::Locator;
pub use value::{Map, Value};
