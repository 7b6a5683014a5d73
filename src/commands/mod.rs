pub mod info;
pub mod offset;
pub mod split;
pub mod toc;
