pub mod entity_generate;
pub mod format_phone_number;
pub mod get;
pub mod skip_row;

use crate::core::process::plugin::PluginRegistryBuilder;

/// Register built-in process plugins into the supplied builder.
pub fn register_builtins(builder: &mut PluginRegistryBuilder) {
    builder
        .register(get::PLUGIN_ID, get::Get::from_config)
        .register(
            format_phone_number::PLUGIN_ID,
            format_phone_number::FormatPhoneNumber::from_config,
        )
        .register(
            skip_row::EXISTS_PLUGIN_ID,
            skip_row::SkipRowIfEntity::exists_from_config,
        )
        .register(
            skip_row::NOT_EXIST_PLUGIN_ID,
            skip_row::SkipRowIfEntity::not_exist_from_config,
        )
        .register(
            entity_generate::PLUGIN_ID,
            entity_generate::EntityGenerate::from_config,
        );
}
