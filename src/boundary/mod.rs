pub mod center;
pub mod editor;
pub mod event;
pub mod headless;
pub mod location;
pub mod renderer;
pub mod view;
