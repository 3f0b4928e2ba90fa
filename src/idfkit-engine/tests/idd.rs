// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use idfkit_engine::idd::Idd;
use idfkit_engine::{ErrorCode, ErrorKind};

const TEST_IDD: &str = "../../test/test.idd";

fn load() -> Idd {
    Idd::open(TEST_IDD).unwrap_or_else(|e| panic!("failed to open {TEST_IDD}: {e}"))
}

#[test]
fn groups() {
    let idd = load();
    let names: Vec<&str> = idd.groups().iter().map(|g| g.name.as_str()).collect();
    assert_eq!(
        vec![
            "Simulation Parameters",
            "Schedules",
            "Surface Construction Elements",
            "Internal Gains",
            "Fans",
            "Output Reporting",
        ],
        names
    );

    let sim = idd.group("simulation parameters").unwrap();
    assert_eq!(
        vec!["Lead Input", "Simulation Data", "Version", "Building", "Timestep"],
        sim.classes
    );
    assert_eq!("Fans", idd.class("fan:constantvolume").unwrap().group);
    assert!(idd.group("Zone HVAC Controls and Thermostats").is_none());
}

#[test]
fn field_annotations() {
    let idd = load();
    let fields = idd.get_fields("Material").unwrap();
    assert_eq!(9, fields.len());
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        vec![
            "Name",
            "Roughness",
            "Thickness",
            "Conductivity",
            "Density",
            "Specific Heat",
            "Thermal Absorptance",
            "Solar Absorptance",
            "Visible Absorptance",
        ],
        names
    );

    let thickness = &fields[2];
    assert!(thickness.required);
    assert_eq!("N1", thickness.id);
    assert_eq!(Some(0.0), thickness.minimum);
    assert!(!thickness.include_minimum);
    assert_eq!(Some(3.0), thickness.maximum);
    assert!(thickness.include_maximum);
    assert!(!thickness.in_bounds(0.0));
    assert!(thickness.in_bounds(3.0));

    let specific_heat = &fields[5];
    assert_eq!(Some(100.0), specific_heat.minimum);
    assert!(specific_heat.include_minimum);
    assert!(specific_heat.in_bounds(100.0));

    let absorptance = &fields[6];
    assert!(!absorptance.required);
    assert_eq!(Some(".9"), absorptance.default.as_deref());

    let roughness = &fields[1];
    assert!(!roughness.is_numeric());
    assert_eq!(6, roughness.keys.len());

    let fan = idd.class("Fan:ConstantVolume").unwrap();
    assert_eq!(Some(9), fan.min_fields);
    assert!(fan.field("Maximum Flow Rate").unwrap().autosizable);

    let building = idd.class("Building").unwrap();
    assert!(building.unique && building.required);
}

#[test]
fn classes_without_fields() {
    let idd = load();
    assert_eq!(0, idd.get_fields("Lead Input").unwrap().len());
    assert_eq!(0, idd.get_fields("SIMULATION DATA").unwrap().len());
    let err = idd.field_index("Lead Input", "Name").unwrap_err();
    assert_eq!(ErrorCode::UnknownField, err.code);
}

#[test]
fn lookup_errors() {
    let idd = load();
    let err = idd.get_fields("Zone").unwrap_err();
    assert_eq!(ErrorCode::UnknownClass, err.code);
    assert_eq!(ErrorKind::Schema, err.kind);
    assert!(err.is_lookup_error());

    let err = idd.field_index("Material", "Colour").unwrap_err();
    assert_eq!(ErrorCode::UnknownField, err.code);
    assert!(err.is_lookup_error());
}

#[test]
fn agrees_with_builtin() {
    let idd = load();
    let builtin = Idd::builtin();
    for (class, field) in [
        ("Material", "Conductivity"),
        ("Schedule:Compact", "Field 4"),
        ("Schedule:Compact", "Field 9"),
        ("Lights", "Watts per Zone Floor Area"),
        ("Fan:ConstantVolume", "Fan Efficiency"),
        ("Building", "North Axis"),
    ] {
        assert_eq!(
            builtin.field_index(class, field).unwrap(),
            idd.field_index(class, field).unwrap(),
            "{class}/{field}"
        );
    }
    assert_eq!(5, idd.field_index("Lights", "watts per zone floor area").unwrap());
}

#[test]
fn copies_are_independent() {
    let idd = load();
    let copy = idd.clone();
    assert_eq!(idd, copy);
    drop(idd);
    assert_eq!(9, copy.get_fields("Material").unwrap().len());
}
