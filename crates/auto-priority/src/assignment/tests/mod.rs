mod common;
mod routing;
mod settings;
mod supervisor;
