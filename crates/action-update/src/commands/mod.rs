pub mod dependencies;
pub mod run;
pub mod update_all;
