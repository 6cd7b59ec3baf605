pub mod password;
pub mod serializer;
pub mod token;
pub mod validators;
