mod dns;

pub use dns::DoqServices;
