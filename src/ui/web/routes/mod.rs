pub(crate) mod history;
pub(crate) mod image;
pub(crate) mod index;
pub(crate) mod library;
