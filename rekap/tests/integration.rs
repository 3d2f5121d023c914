//! Tests d'intégration: de la hiérarchie à la FeatureCollection

use rekap::{
    aggregate, build_map, ContestData, ContestKind, Contestant, MapRequest, Region,
    RegionGeometry, RegionIndex, RegionLevel, Rgb, Thresholds, TurnoutInfo, VoteTally,
};

const SQUARE: &str = r#"{"type":"Polygon","coordinates":[[[107.5,-6.8],[107.7,-6.8],[107.7,-7.0],[107.5,-7.0],[107.5,-6.8]]]}"#;

fn regions() -> Vec<Region> {
    vec![
        Region::new(32, "Jawa Barat", RegionLevel::Provinsi, None),
        Region::new(3273, "Kota Bandung", RegionLevel::Kabupaten, Some(32)),
        Region::new(3205, "Kab. Garut", RegionLevel::Kabupaten, Some(32)),
        Region::new(327301, "Coblong", RegionLevel::Kecamatan, Some(3273)),
        Region::new(327302, "Andir", RegionLevel::Kecamatan, Some(3273)),
        Region::new(320501, "Tarogong Kidul", RegionLevel::Kecamatan, Some(3205)),
        Region::new(32730101, "Dago", RegionLevel::Desa, Some(327301)),
        Region::new(32730102, "Lebakgede", RegionLevel::Desa, Some(327301)),
        Region::new(32730201, "Campaka", RegionLevel::Desa, Some(327302)),
        Region::new(32050101, "Pataruman", RegionLevel::Desa, Some(320501)),
    ]
}

fn paslon() -> Vec<Contestant> {
    [(1, "Anies", "#2e7d32"), (2, "Prabowo", "#1565c0"), (3, "Ganjar", "#c62828")]
        .into_iter()
        .map(|(n, name, color)| Contestant {
            id: 100 + n,
            kind: ContestKind::Pilpres,
            ballot_number: n as u32,
            name: name.to_string(),
            running_mate: None,
            color: color.parse().unwrap(),
            photo: None,
        })
        .collect()
}

fn pilpres() -> ContestData {
    let mut data = ContestData::new(ContestKind::Pilpres, paslon());
    data.tallies = vec![
        VoteTally::new(32730101)
            .with_votes(101, 120)
            .with_votes(102, 60)
            .with_votes(103, 20)
            .with_invalid(10),
        VoteTally::new(32730102)
            .with_votes(101, 30)
            .with_votes(102, 120)
            .with_invalid(4),
        VoteTally::new(32730201).with_votes(102, 55).with_votes(103, 45),
        VoteTally::new(32050101)
            .with_votes(101, 10)
            .with_votes(102, 10)
            .with_votes(103, 10),
    ];
    data.turnout = vec![
        TurnoutInfo {
            region_id: 32730101,
            polling_stations: 4,
            registered_voters: 300,
        },
        TurnoutInfo {
            region_id: 32730201,
            polling_stations: 2,
            registered_voters: 150,
        },
    ];
    data
}

fn geometries() -> Vec<RegionGeometry> {
    let mut rows: Vec<RegionGeometry> = [3273, 3205, 327301, 327302, 320501, 32730101, 32730201]
        .into_iter()
        .map(|region_id| RegionGeometry {
            region_id,
            payload: Some(SQUARE.to_string()),
            display_color: Some(Rgb::new(0x80, 0x80, 0x80)),
        })
        .collect();
    // Brouillon sans contour
    rows.push(RegionGeometry {
        region_id: 32730102,
        payload: None,
        display_color: None,
    });
    rows
}

#[test]
fn test_rollup_matches_parent_level() {
    let index = RegionIndex::build(regions()).unwrap();
    let data = pilpres();
    let t = Thresholds::PRESIDENTIAL;

    let kokab = aggregate(&index, &data, &t, RegionLevel::Kabupaten, None).unwrap();

    for kab in index.at_level(RegionLevel::Kabupaten) {
        let kec = aggregate(&index, &data, &t, RegionLevel::Kecamatan, Some(kab.id)).unwrap();
        let parent = &kokab[&kab.id];

        assert_eq!(
            kec.values().map(|s| s.total_valid).sum::<u64>(),
            parent.total_valid
        );
        assert_eq!(
            kec.values().map(|s| s.invalid_votes).sum::<u64>(),
            parent.invalid_votes
        );
        assert_eq!(
            kec.values().map(|s| s.registered_voters).sum::<u64>(),
            parent.registered_voters
        );
        for contestant in data.contestants.iter() {
            let sum: u64 = kec
                .values()
                .flat_map(|s| &s.breakdown)
                .filter(|r| r.contestant_id == contestant.id)
                .map(|r| r.votes)
                .sum();
            let parent_votes = parent
                .breakdown
                .iter()
                .find(|r| r.contestant_id == contestant.id)
                .map(|r| r.votes)
                .unwrap();
            assert_eq!(sum, parent_votes, "{} in {}", contestant.name, kab.name);
        }
    }
}

#[test]
fn test_kokab_pilpres_map() {
    let index = RegionIndex::build(regions()).unwrap();
    let request = MapRequest::from_query(Some("kokab"), Some("pilpres"), None, None).unwrap();
    let (fc, report) = build_map(
        &request,
        &index,
        &geometries(),
        Some(&pilpres()),
        &Thresholds::PRESIDENTIAL,
    )
    .unwrap();

    assert_eq!(fc.features.len(), 2);
    assert_eq!(report.features_emitted, 2);

    // Kab. Garut (ordre alphabétique): égalité à trois, le n°1 l'emporte
    let garut = fc.features[0].properties.as_ref().unwrap();
    assert_eq!(garut["nama"], "Kab. Garut");
    let detail = &garut["detail_pilpres"];
    assert_eq!(detail["pemenang"], 1);
    assert_eq!(detail["tingkat"], "narrow");
    assert_eq!(
        garut["warna"],
        "#2e7d32"
            .parse::<Rgb>()
            .unwrap()
            .blend_toward_white(0.5)
            .to_hex()
    );

    // Kota Bandung: 150/235/65 → Prabowo 52.2%
    let bandung = fc.features[1].properties.as_ref().unwrap();
    let detail = &bandung["detail_pilpres"];
    assert_eq!(detail["sah"], 450);
    assert_eq!(detail["sts"], 14);
    assert_eq!(detail["total"], 464);
    assert_eq!(detail["dpt"], 450);
    assert_eq!(detail["tps"], 6);
    assert_eq!(detail["pemenang"], 2);
    assert_eq!(detail["tingkat"], "moderate");
    assert_eq!(bandung["fill_opacity"], 0.65);
    assert_eq!(detail["kandidat"].as_array().unwrap().len(), 3);
}

#[test]
fn test_desa_map_skips_null_geometry() {
    let index = RegionIndex::build(regions()).unwrap();
    let request =
        MapRequest::from_query(Some("desa"), Some("pilpres"), None, Some(327301)).unwrap();
    let (fc, report) = build_map(
        &request,
        &index,
        &geometries(),
        Some(&pilpres()),
        &Thresholds::PRESIDENTIAL,
    )
    .unwrap();

    // Lebakgede n'a pas de contour
    assert_eq!(fc.features.len(), 1);
    let dago = fc.features[0].properties.as_ref().unwrap();
    assert_eq!(dago["nama"], "Dago");
    assert_eq!(dago["kecamatan"], "Coblong");
    assert_eq!(dago["kabupaten"], "Kota Bandung");
    assert_eq!(dago["detail_pilpres"]["persen_menang"], 60.0);
    assert_eq!(dago["warna"], "#2e7d32");
    assert_eq!(report.skipped.len(), 1);
}

#[test]
fn test_region_without_tally_is_neutral() {
    let index = RegionIndex::build(regions()).unwrap();
    let mut data = pilpres();
    data.tallies.retain(|t| t.region_id != 32730201);

    let request =
        MapRequest::from_query(Some("kecamatan"), Some("pilpres"), Some(3273), None).unwrap();
    let (fc, report) = build_map(
        &request,
        &index,
        &geometries(),
        Some(&data),
        &Thresholds::PRESIDENTIAL,
    )
    .unwrap();

    let andir = fc.features[0].properties.as_ref().unwrap();
    assert_eq!(andir["nama"], "Andir");
    assert_eq!(andir["warna"], "#c0c0c0");
    assert!(!andir.contains_key("detail_pilpres"));
    assert_eq!(report.features_without_tally, 1);
}

#[test]
fn test_default_mode_uses_display_color() {
    let index = RegionIndex::build(regions()).unwrap();
    let request = MapRequest::from_query(None, None, None, None).unwrap();
    let (fc, _) = build_map(&request, &index, &geometries(), None, &Thresholds::default()).unwrap();

    for feature in &fc.features {
        let props = feature.properties.as_ref().unwrap();
        assert_eq!(props["warna"], "#808080");
        assert_eq!(props["level"], "kokab");
        assert!(!props.contains_key("detail_pilpres"));
    }
}

#[test]
fn test_legislative_thresholds_change_tier() {
    let index = RegionIndex::build(regions()).unwrap();
    let data = pilpres();

    // Garut: 33.3% → narrow en pilpres, decisive avec les seuils pileg
    let pres = aggregate(&index, &data, &Thresholds::PRESIDENTIAL, RegionLevel::Kabupaten, None)
        .unwrap();
    let leg = aggregate(&index, &data, &Thresholds::LEGISLATIVE, RegionLevel::Kabupaten, None)
        .unwrap();
    assert_eq!(pres[&3205].tier, Some(rekap::IntensityTier::Narrow));
    assert_eq!(leg[&3205].tier, Some(rekap::IntensityTier::Decisive));
}
