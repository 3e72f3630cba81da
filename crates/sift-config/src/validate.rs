//! Configuration validation.
//!
//! Unlike parse errors, these checks run on the merged configuration, so a
//! value is only rejected once every layer has been applied.

use crate::{Config, ConfigError, END_BYTE, HOLE_BYTE};

/// Largest supported value for `max_surface_forms_per_analyzed_form`; the
/// dedup counter is stored in a single key byte.
const MAX_SURFACE_FORMS: usize = 256;

/// Validates the configuration, failing on the first invalid option.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let suggest = &config.suggest;

    let forms = suggest.max_surface_forms_per_analyzed_form;
    if forms == 0 || forms > MAX_SURFACE_FORMS {
        return Err(ConfigError::MaxSurfaceForms { value: forms });
    }

    let expansions = suggest.max_graph_expansions;
    if expansions < 1 && expansions != -1 {
        return Err(ConfigError::MaxGraphExpansions { value: expansions });
    }

    if suggest.separator_byte == END_BYTE || suggest.separator_byte == HOLE_BYTE {
        return Err(ConfigError::ReservedSeparator {
            byte: suggest.separator_byte,
        });
    }

    if suggest.max_determinized_states == 0 {
        return Err(ConfigError::DeterminizedStates);
    }

    if config.build.merge_factor < 2 {
        return Err(ConfigError::MergeFactor {
            value: config.build.merge_factor,
        });
    }

    if config.build.sort_buffer_bytes == 0 {
        return Err(ConfigError::SortBuffer);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_surface_form_bounds() {
        let mut config = Config::default();
        config.suggest.max_surface_forms_per_analyzed_form = 257;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MaxSurfaceForms { value: 257 })
        ));

        config.suggest.max_surface_forms_per_analyzed_form = 1;
        assert!(validate_config(&config).is_ok());

        config.suggest.max_surface_forms_per_analyzed_form = 256;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_graph_expansion_bounds() {
        let mut config = Config::default();
        for bad in [0, -2, -100] {
            config.suggest.max_graph_expansions = bad;
            assert!(matches!(
                validate_config(&config),
                Err(ConfigError::MaxGraphExpansions { .. })
            ));
        }

        config.suggest.max_graph_expansions = 1;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_reserved_separator() {
        let mut config = Config::default();
        config.suggest.separator_byte = 0x1e;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ReservedSeparator { byte: 0x1e })
        ));

        config.suggest.separator_byte = b' ';
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_build_limits() {
        let mut config = Config::default();
        config.build.merge_factor = 1;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MergeFactor { value: 1 })
        ));

        config.build.merge_factor = 2;
        config.build.sort_buffer_bytes = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::SortBuffer)
        ));
    }
}
