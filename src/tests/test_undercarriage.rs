#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::f64::consts::FRAC_PI_4;

    use nalgebra::Vector3;

    use crate::parameter_error::ParameterError;
    use crate::tests::test_utils::read_fixture;
    use crate::undercarriage::{
        parse_wheel_params, parse_wheel_params_file, JointOrigin, JointOriginLookup, TransformLookup,
        WheelParamsKind,
    };

    const TOLERANCE: f64 = 1e-9;

    struct Model {
        joints: HashMap<&'static str, JointOrigin>,
    }

    impl Model {
        fn new(joints: &[(&'static str, &str, [f64; 3])]) -> Self {
            let joints = joints
                .iter()
                .map(|(name, parent, p)| {
                    let origin = JointOrigin {
                        parent_link: parent.to_string(),
                        position: Vector3::new(p[0], p[1], p[2]),
                    };
                    (*name, origin)
                })
                .collect();
            Model { joints }
        }
    }

    impl JointOriginLookup for Model {
        fn joint_origin(&self, joint: &str) -> Option<JointOrigin> {
            self.joints.get(joint).cloned()
        }
    }

    struct Transforms {
        translation: Option<Vector3<f64>>,
    }

    impl TransformLookup for Transforms {
        fn lookup_translation(&self, target_frame: &str, source_frame: &str) -> Result<Vector3<f64>, String> {
            self.translation
                .ok_or_else(|| format!("no transform from {} to {}", source_frame, target_frame))
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn test_wheels_from_file() {
        let wheels = parse_wheel_params_file("src/tests/data/wheels.yaml", WheelParamsKind::Ctrl, None, None)
            .expect("Failed to load wheels");
        assert_eq!(wheels.len(), 4);

        let front_left = &wheels[0];
        assert_eq!(front_left.geom.steer_name, "fl_caster_rotation_joint");
        assert_eq!(front_left.geom.drive_name, "fl_caster_r_wheel_joint");
        assert!(close(front_left.geom.wheel_x_pos_mm, 240.0));
        assert!(close(front_left.geom.wheel_y_pos_mm, 205.0));
        assert!(close(front_left.geom.radius_wheel_mm, 80.0));
        assert!(close(front_left.geom.dist_steer_axis_to_drive_wheel_mm, 30.0));

        let ctrl = front_left.ctrl.expect("drive control limits");
        assert!(close(ctrl.wheel_neutral_pos, -FRAC_PI_4));
        assert!(close(ctrl.max_steer_rate, 12.0));
        assert!(close(ctrl.max_drive_rate, 20.0));

        let pos_ctrl = front_left.pos_ctrl.expect("steering position control");
        assert!(close(pos_ctrl.spring, 10.0));
        assert!(close(pos_ctrl.dd_phi_max, 100.0));
    }

    #[test]
    fn test_wheel_values_override_defaults() -> anyhow::Result<()> {
        let yaml = read_fixture("wheels.yaml")?;
        let wheels = parse_wheel_params(&yaml, WheelParamsKind::Ctrl, None, None)?;

        // steer_ctrl merged field by field
        let back_right = wheels[2].pos_ctrl.expect("steering position control");
        assert!(close(back_right.spring, 15.0));
        assert!(close(back_right.damp, 2.5));
        assert!(close(back_right.virt_mass, 0.1));

        assert!(close(wheels[3].geom.radius_wheel_mm, 100.0));
        assert!(close(wheels[2].geom.radius_wheel_mm, 80.0));
        Ok(())
    }

    #[test]
    fn test_geometry_only() -> anyhow::Result<()> {
        let yaml = read_fixture("wheels.yaml")?;
        let wheels = parse_wheel_params(&yaml, WheelParamsKind::Geom, None, None)?;
        assert!(wheels.iter().all(|w| w.ctrl.is_none() && w.pos_ctrl.is_none()));

        let direct = parse_wheel_params(&yaml, WheelParamsKind::DirectCtrl, None, None)?;
        assert!(direct.iter().all(|w| w.ctrl.is_some() && w.pos_ctrl.is_none()));
        Ok(())
    }

    #[test]
    fn test_geometry_from_model() {
        let yaml = "
wheels:
  - steer: steer_joint
    drive: drive_joint
";
        let model = Model::new(&[
            ("steer_joint", "base_link", [0.3, -0.2, 0.1]),
            ("drive_joint", "steer_link", [0.03, 0.04, 0.0]),
        ]);
        let wheels = parse_wheel_params(yaml, WheelParamsKind::Geom, Some(&model), None).expect("wheels from model");
        let geom = &wheels[0].geom;
        assert!(close(geom.wheel_x_pos_mm, 300.0));
        assert!(close(geom.wheel_y_pos_mm, -200.0));
        assert!(close(geom.radius_wheel_mm, 100.0));
        assert!(close(geom.dist_steer_axis_to_drive_wheel_mm, 50.0));
    }

    #[test]
    fn test_steering_axis_from_transform() {
        let yaml = "
wheels:
  - steer: steer_joint
    x_pos: 0.5
    y_pos: 0.5
    wheel_radius: 0.08
    wheel_offset: 0.02
";
        let transforms = Transforms { translation: Some(Vector3::new(0.25, -0.125, 0.3)) };
        let wheels =
            parse_wheel_params(yaml, WheelParamsKind::Geom, None, Some(&transforms)).expect("wheels with transform");
        let geom = &wheels[0].geom;
        assert!(close(geom.wheel_x_pos_mm, 250.0));
        assert!(close(geom.wheel_y_pos_mm, -125.0));
        assert!(close(geom.radius_wheel_mm, 80.0));

        let broken = Transforms { translation: None };
        let result = parse_wheel_params(yaml, WheelParamsKind::Geom, None, Some(&broken));
        assert!(matches!(result, Err(ParameterError::TransformLookup(_))), "{:?}", result);
    }

    #[test]
    fn test_zero_radius() {
        let yaml = "
defaults:
  wheel_radius: 0.0
  wheel_offset: 0.03
wheels:
  - steer: fl_steer
    x_pos: 0.2
    y_pos: 0.2
";
        match parse_wheel_params(yaml, WheelParamsKind::Geom, None, None) {
            Err(ParameterError::WheelRadiusZero(wheel)) => assert_eq!(wheel, "fl_steer"),
            other => panic!("Expected WheelRadiusZero, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_position() {
        let yaml = "
defaults:
  wheel_radius: 0.08
  wheel_offset: 0.03
wheels:
  - steer: fl_steer
    y_pos: 0.2
";
        match parse_wheel_params(yaml, WheelParamsKind::Geom, None, None) {
            Err(ParameterError::MissingField(field)) => assert!(field.contains("x_pos"), "{}", field),
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_incomplete_steer_ctrl() {
        let yaml = "
defaults:
  wheel_radius: 0.08
  wheel_offset: 0.03
  steer_ctrl:
    spring: 10.0
    damp: 2.5
    virt_mass: 0.1
    d_phi_max: 12.0
wheels:
  - x_pos: 0.2
    y_pos: 0.2
";
        match parse_wheel_params(yaml, WheelParamsKind::Ctrl, None, None) {
            Err(ParameterError::MissingField(field)) => assert_eq!(field, "steer_ctrl.dd_phi_max"),
            other => panic!("Expected MissingField, got {:?}", other),
        }
        // Not needed without steering position control
        assert!(parse_wheel_params(yaml, WheelParamsKind::DirectCtrl, None, None).is_ok());
    }

    #[test]
    fn test_no_wheels() {
        let missing = parse_wheel_params("defaults:\n  wheel_radius: 0.08\n", WheelParamsKind::Geom, None, None);
        assert!(matches!(missing, Err(ParameterError::MissingField(_))), "{:?}", missing);

        let empty = parse_wheel_params("wheels: []\n", WheelParamsKind::Geom, None, None);
        assert!(matches!(empty, Err(ParameterError::InvalidValue(_))), "{:?}", empty);
    }
}
