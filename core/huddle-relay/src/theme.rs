//! Dark-mode preference from the command line.
//!
//! Mounting the preference writes it back, so `show` on a fresh root stores
//! the default.

use std::sync::Arc;

use clap::{Subcommand, ValueEnum};
use huddle_core::{
    load_settings_with_storage, ClassList, FileStore, PreferenceSync, StorageConfig,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ThemeChoice {
    Dark,
    Light,
}

#[derive(Subcommand)]
pub enum ThemeAction {
    /// Print the current theme
    Show,
    /// Switch between dark and light
    Toggle,
    /// Set the theme explicitly
    Set {
        #[arg(value_enum)]
        theme: ThemeChoice,
    },
}

fn mount(storage: &StorageConfig) -> PreferenceSync {
    let settings = load_settings_with_storage(storage);
    let store = Arc::new(FileStore::new(&storage.local_storage_file()));
    PreferenceSync::mount(store, ClassList::default(), settings.default_dark_mode)
}

fn apply(sync: &mut PreferenceSync, action: ThemeAction) {
    match action {
        ThemeAction::Show => {}
        ThemeAction::Toggle => {
            sync.toggle();
        }
        ThemeAction::Set { theme } => sync.set(theme == ThemeChoice::Dark),
    }
}

pub fn run(storage: &StorageConfig, action: ThemeAction) -> Result<(), String> {
    let mut sync = mount(storage);
    apply(&mut sync, action);
    println!("{}", sync.theme().class_name());
    Ok(())
}
