pub mod template;
pub mod vault_args;

pub use template::TemplateCommand;
pub use vault_args::VaultArgs;
