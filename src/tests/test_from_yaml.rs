#[cfg(test)]
mod tests {
    use crate::parameter_error::ParameterError;
    use crate::parameters::{DampingMethod, DampingParams, TwistControllerParams, DIV0_SAFE, ZERO_THRESHOLD};
    use crate::tests::test_utils::read_fixture;
    use crate::twist_controller::TwistController;

    const READ_ERROR: &'static str = "Failed to load parameters from file";

    #[test]
    fn test_parameters_from_yaml() {
        let filename = "src/tests/data/twist_controller.yaml";
        let loaded = TwistControllerParams::from_yaml_file(filename).expect(READ_ERROR);

        let expected = TwistControllerParams {
            dof: 7,
            damping: DampingParams {
                method: DampingMethod::Manipulability,
                damping_factor: 0.2,
                lambda_max: 0.1,
                w_threshold: 0.005,
                eps_truncation: 0.001,
                eps_damping: 0.003,
                numerical_filtering: false,
            },
            k_h: 0.5,
            priority_main: 400,
            damping_start_count: 60.0,
            zero_threshold: ZERO_THRESHOLD,
            div0_safe: DIV0_SAFE,
            base_active: false,
        };
        assert_eq!(expected, loaded);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() -> anyhow::Result<()> {
        let contents = read_fixture("twist_controller_minimal.yaml")?;
        let loaded = TwistControllerParams::from_yaml_str(&contents)?;
        assert_eq!(loaded, TwistControllerParams::new(6));
        Ok(())
    }

    #[test]
    fn test_loaded_parameters_build_controller() {
        let loaded = TwistControllerParams::from_yaml_file("src/tests/data/twist_controller.yaml").expect(READ_ERROR);
        let controller = TwistController::new(loaded).expect("controller from file");
        assert_eq!(controller.solver().params().priority_main, 400);
    }

    #[test]
    fn test_missing_dof() {
        let result = TwistControllerParams::from_yaml_str("damping_method: constant\ndamping_factor: 0.1\n");
        match result {
            Err(ParameterError::MissingField(field)) => assert_eq!(field, "dof"),
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_damping_method() {
        let result = TwistControllerParams::from_yaml_str("dof: 6\ndamping_method: quadratic\n");
        assert!(matches!(result, Err(ParameterError::ParseError(_))), "{:?}", result);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_dof = TwistControllerParams::from_yaml_str("dof: 0\n");
        assert!(matches!(zero_dof, Err(ParameterError::KinematicsConfigurationError(_))), "{:?}", zero_dof);

        let counter = TwistControllerParams::from_yaml_str("dof: 6\ndamping_start_count: 0.5\n");
        assert!(matches!(counter, Err(ParameterError::InvalidValue(_))), "{:?}", counter);

        let div0 = TwistControllerParams::from_yaml_str("dof: 6\ndiv0_safe: 0.0\n");
        assert!(matches!(div0, Err(ParameterError::InvalidValue(_))), "{:?}", div0);
    }

    #[test]
    fn test_missing_file() {
        let result = TwistControllerParams::from_yaml_file("src/tests/data/does_not_exist.yaml");
        assert!(matches!(result, Err(ParameterError::IoError(_))), "{:?}", result);
    }
}
