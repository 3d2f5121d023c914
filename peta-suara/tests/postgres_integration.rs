//! Tests d'intégration PostgreSQL
//!
//! Ces tests nécessitent une base PostgreSQL disponible.
//! Configuration via variables d'environnement:
//! - PGHOST, PGPORT, PGUSER, PGPASSWORD, PGDATABASE
//!
//! Exécution:
//! ```bash
//! # Avec PostgreSQL local
//! cargo test -p peta-suara --test postgres_integration -- --ignored
//!
//! # Avec Docker
//! docker run -d --name postgres-test -e POSTGRES_PASSWORD=test -p 5432:5432 postgres:16
//! PGPASSWORD=test cargo test -p peta-suara --test postgres_integration -- --ignored
//! ```

use std::collections::BTreeSet;

use anyhow::Result;
use deadpool_postgres::Pool;
use serde_json::Value;

use peta_suara::store::admin::{
    delete_region, insert_region, recolor_geometry, save_district, update_contestant,
    upsert_caleg_votes, upsert_geometry, upsert_tally, upsert_turnout,
};
use peta_suara::store::postgres::{children_of, load_districts, load_hierarchy, load_tallies};
use peta_suara::store::schema::create_schema;
use peta_suara::store::{create_pool, DatabaseConfig};
use peta_suara::{render_map, Config, ContestantDirectory};
use rekap::{
    ContestKind, Contestant, DistrictTier, ElectoralDistrict, MapRequest, Region, RegionGeometry,
    RegionLevel, RekapError, Rgb, TurnoutInfo, VoteTally,
};

/// Pool de test; chaque test travaille dans son propre schéma
fn create_test_pool() -> Result<Pool> {
    let mut config = DatabaseConfig::from_env();
    if std::env::var("PGDATABASE").is_err() {
        config.dbname = "pemilu_test".into();
    }
    config.pool_size = 4;
    create_pool(&config)
}

fn square(x: f64, y: f64) -> String {
    format!(
        r#"{{"type":"Polygon","coordinates":[[[{x},{y}],[{x1},{y}],[{x1},{y1}],[{x},{y1}],[{x},{y}]]]}}"#,
        x = x,
        y = y,
        x1 = x + 0.1,
        y1 = y + 0.1
    )
}

fn paslon(id: i64, ballot_number: u32, name: &str, color: &str) -> Contestant {
    Contestant {
        id,
        kind: ContestKind::Pilpres,
        ballot_number,
        name: name.into(),
        running_mate: Some(format!("Wakil {}", ballot_number)),
        color: color.parse().expect("valid colour"),
        photo: None,
    }
}

/// Jawa Barat > Bandung > {Ciwidey > 2 desa, Pasirjambu > 1 desa}
async fn seed_regions(pool: &Pool, schema: &str) -> Result<()> {
    let regions = [
        Region::new(32, "Jawa Barat", RegionLevel::Provinsi, None),
        Region::new(3204, "Bandung", RegionLevel::Kabupaten, Some(32)),
        Region::new(320401, "Ciwidey", RegionLevel::Kecamatan, Some(3204)),
        Region::new(320402, "Pasirjambu", RegionLevel::Kecamatan, Some(3204)),
        Region::new(32040101, "Lebakmuncang", RegionLevel::Desa, Some(320401)),
        Region::new(32040102, "Panundaan", RegionLevel::Desa, Some(320401)),
        Region::new(32040201, "Cibodas", RegionLevel::Desa, Some(320402)),
    ];
    for region in &regions {
        insert_region(pool, schema, region).await?;
    }
    Ok(())
}

async fn seed_pilpres(pool: &Pool, schema: &str, directory: &ContestantDirectory) -> Result<()> {
    for contestant in [
        paslon(1, 1, "Anies", "#1f77b4"),
        paslon(2, 2, "Prabowo", "#ff7f0e"),
        paslon(3, 3, "Ganjar", "#d62728"),
    ] {
        update_contestant(pool, schema, directory, &contestant).await?;
    }

    let tallies = [
        VoteTally::new(32040101)
            .with_votes(1, 100)
            .with_votes(2, 300)
            .with_votes(3, 50)
            .with_invalid(10),
        VoteTally::new(32040102)
            .with_votes(1, 50)
            .with_votes(2, 100)
            .with_votes(3, 50),
        VoteTally::new(32040201)
            .with_votes(1, 120)
            .with_votes(2, 80)
            .with_invalid(4),
    ];
    for tally in &tallies {
        upsert_tally(pool, schema, ContestKind::Pilpres, tally).await?;
    }

    upsert_turnout(
        pool,
        schema,
        &TurnoutInfo {
            region_id: 32040101,
            polling_stations: 3,
            registered_voters: 500,
        },
    )
    .await?;

    upsert_geometry(
        pool,
        schema,
        &RegionGeometry {
            region_id: 320401,
            payload: Some(square(107.4, -7.1)),
            display_color: Some(Rgb::new(0x33, 0x66, 0x99)),
        },
    )
    .await?;
    upsert_geometry(
        pool,
        schema,
        &RegionGeometry {
            region_id: 320402,
            payload: Some(square(107.5, -7.1)),
            display_color: None,
        },
    )
    .await?;
    Ok(())
}

fn feature_by_name<'a>(collection: &'a Value, name: &str) -> &'a Value {
    collection["features"]
        .as_array()
        .expect("features array")
        .iter()
        .find(|f| f["properties"]["nama"] == name)
        .unwrap_or_else(|| panic!("feature {name} missing"))
}

/// Test de connexion et création du schéma
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_create_schema_twice() {
    let pool = create_test_pool().expect("Failed to create pool");
    create_schema(&pool, "peta_test_schema", true)
        .await
        .expect("Failed to create schema");
    create_schema(&pool, "peta_test_schema", false)
        .await
        .expect("Schema creation must be idempotent");
}

/// Hiérarchie, listes en cascade et suppression protégée par les rekap
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_region_lifecycle() {
    let schema = "peta_test_regions";
    let pool = create_test_pool().expect("Failed to create pool");
    create_schema(&pool, schema, true).await.unwrap();
    seed_regions(&pool, schema).await.unwrap();

    let kecamatan = children_of(&pool, schema, 3204, RegionLevel::Kecamatan)
        .await
        .unwrap();
    let names: Vec<_> = kecamatan.iter().map(|k| k.nama.as_str()).collect();
    assert_eq!(names, ["Ciwidey", "Pasirjambu"]);

    // Desa sous une provinsi: refusé
    let misplaced = Region::new(32990001, "Nowhere", RegionLevel::Desa, Some(32));
    assert!(insert_region(&pool, schema, &misplaced).await.is_err());

    // Hiérarchie partielle: descendants + ancêtres du périmètre
    let scoped = load_hierarchy(&pool, schema, Some(320401)).await.unwrap();
    let ids: BTreeSet<_> = scoped.iter().map(|r| r.id).collect();
    assert_eq!(
        ids,
        BTreeSet::from([32, 3204, 320401, 32040101, 32040102])
    );

    upsert_tally(
        &pool,
        schema,
        ContestKind::Pilpres,
        &VoteTally::new(32040201).with_invalid(1),
    )
    .await
    .unwrap();

    let err = delete_region(&pool, schema, 320402).await.unwrap_err();
    match err.downcast_ref::<RekapError>() {
        Some(RekapError::RegionInUse { region_id, tallies }) => {
            assert_eq!(*region_id, 320402);
            assert_eq!(*tallies, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Sans rekap: suppression en cascade
    let removed = delete_region(&pool, schema, 320401).await.unwrap();
    assert_eq!(removed, 3);
}

/// Carte kecamatan pilpres construite depuis la base
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_kecamatan_pilpres_map() {
    let schema = "peta_test_map";
    let pool = create_test_pool().expect("Failed to create pool");
    create_schema(&pool, schema, true).await.unwrap();
    seed_regions(&pool, schema).await.unwrap();

    let directory = ContestantDirectory::new(pool.clone(), schema);
    seed_pilpres(&pool, schema, &directory).await.unwrap();

    let request =
        MapRequest::from_query(Some("kecamatan"), Some("pilpres"), Some(3204), None).unwrap();
    let (collection, report) =
        render_map(&pool, schema, &Config::default(), &directory, &request)
            .await
            .unwrap();
    assert_eq!(report.features_emitted, 2);

    let json = serde_json::to_value(&collection).unwrap();

    // Ciwidey: 150 / 400 / 100, sah 650, 61.5% → decisive
    let ciwidey = feature_by_name(&json, "Ciwidey");
    let props = &ciwidey["properties"];
    assert_eq!(props["detail_pilpres"]["sah"], 650);
    assert_eq!(props["detail_pilpres"]["sts"], 10);
    assert_eq!(props["detail_pilpres"]["dpt"], 500);
    assert_eq!(props["detail_pilpres"]["pemenang"], 2);
    assert_eq!(props["detail_pilpres"]["tingkat"], "decisive");

    // Pasirjambu: 120 / 80, 60% → decisive (seuil inclus)
    let pasirjambu = feature_by_name(&json, "Pasirjambu");
    assert_eq!(pasirjambu["properties"]["detail_pilpres"]["pemenang"], 1);

    // Mode default: couleur d'affichage stockée
    let request = MapRequest::from_query(Some("kecamatan"), None, Some(3204), None).unwrap();
    let (collection, _) = render_map(&pool, schema, &Config::default(), &directory, &request)
        .await
        .unwrap();
    let json = serde_json::to_value(&collection).unwrap();
    assert_eq!(
        feature_by_name(&json, "Ciwidey")["properties"]["warna"],
        "#336699"
    );

    recolor_geometry(&pool, schema, 320401, Rgb::new(0, 0, 0))
        .await
        .unwrap();
    assert!(recolor_geometry(&pool, schema, 99, Rgb::WHITE).await.is_err());
}

/// Voix des caleg ajoutées à leur partai
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_pileg_caleg_votes_fold_into_party() {
    let schema = "peta_test_pileg";
    let pool = create_test_pool().expect("Failed to create pool");
    create_schema(&pool, schema, true).await.unwrap();
    seed_regions(&pool, schema).await.unwrap();

    let directory = ContestantDirectory::new(pool.clone(), schema);
    let partai = Contestant {
        id: 5,
        kind: ContestKind::PilegRi,
        ballot_number: 5,
        name: "Partai Lima".into(),
        running_mate: None,
        color: Rgb::new(200, 0, 0),
        photo: None,
    };
    update_contestant(&pool, schema, &directory, &partai)
        .await
        .unwrap();
    assert_eq!(directory.get(ContestKind::PilegRi).await.unwrap().len(), 1);

    let dapil = ElectoralDistrict {
        id: 0,
        name: "Jawa Barat II".into(),
        tier: DistrictTier::Ri,
        seat_count: 10,
        kabupaten_id: None,
        covered_regions: BTreeSet::from([3204]),
    };
    let dapil_id = save_district(&pool, schema, &dapil).await.unwrap();

    let client = pool.get().await.unwrap();
    client
        .execute(
            &format!(
                "INSERT INTO {}.caleg (id, partai_id, dapil_id, no_urut, nama) VALUES (51, 5, $1, 1, 'Caleg Satu')",
                schema
            ),
            &[&dapil_id],
        )
        .await
        .unwrap();

    upsert_tally(
        &pool,
        schema,
        ContestKind::PilegRi,
        &VoteTally::new(32040101).with_votes(5, 40),
    )
    .await
    .unwrap();
    upsert_caleg_votes(&pool, schema, 32040101, &[(51, 60)])
        .await
        .unwrap();

    let tallies = load_tallies(&pool, schema, ContestKind::PilegRi, &[32040101])
        .await
        .unwrap();
    assert_eq!(tallies.len(), 1);
    assert_eq!(tallies[0].votes_for(5), 100);
}

/// Cakupan de dapil en conflit refusée
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_dapil_conflict_rejected() {
    let schema = "peta_test_dapil";
    let pool = create_test_pool().expect("Failed to create pool");
    create_schema(&pool, schema, true).await.unwrap();
    seed_regions(&pool, schema).await.unwrap();

    let first = ElectoralDistrict {
        id: 0,
        name: "Bandung 1".into(),
        tier: DistrictTier::KabKota,
        seat_count: 12,
        kabupaten_id: Some(3204),
        covered_regions: BTreeSet::from([320401]),
    };
    save_district(&pool, schema, &first).await.unwrap();

    // Un desa de Ciwidey déjà couverte entière
    let second = ElectoralDistrict {
        name: "Bandung 2".into(),
        covered_regions: BTreeSet::from([32040101, 320402]),
        ..first.clone()
    };
    let err = save_district(&pool, schema, &second).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RekapError>(),
        Some(RekapError::Coverage(violations)) if violations.len() == 1
    ));

    let districts = load_districts(&pool, schema, Some(DistrictTier::KabKota))
        .await
        .unwrap();
    assert_eq!(districts.len(), 1);
    assert_eq!(districts[0].covered_regions, BTreeSet::from([320401]));
}

/// Un seul niveau de rekap par branche
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_mixed_level_tally_rejected() {
    let schema = "peta_test_tally_level";
    let pool = create_test_pool().expect("Failed to create pool");
    create_schema(&pool, schema, true).await.unwrap();
    seed_regions(&pool, schema).await.unwrap();

    upsert_tally(
        &pool,
        schema,
        ContestKind::Pilpres,
        &VoteTally::new(320401).with_votes(1, 100),
    )
    .await
    .unwrap();

    // Desa sous un kecamatan déjà saisi, puis kabupaten au-dessus
    for region_id in [32040101, 3204] {
        let err = upsert_tally(
            &pool,
            schema,
            ContestKind::Pilpres,
            &VoteTally::new(region_id).with_votes(1, 7),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RekapError>(),
            Some(RekapError::TallyOverlap { conflicting: 320401, .. })
        ));
    }

    // Même région: remplacement; kecamatan voisin et autre scrutin: libres
    upsert_tally(
        &pool,
        schema,
        ContestKind::Pilpres,
        &VoteTally::new(320401).with_votes(1, 120),
    )
    .await
    .unwrap();
    upsert_tally(
        &pool,
        schema,
        ContestKind::Pilpres,
        &VoteTally::new(320402).with_votes(2, 10),
    )
    .await
    .unwrap();
    upsert_tally(
        &pool,
        schema,
        ContestKind::PilegRi,
        &VoteTally::new(32040101).with_invalid(3),
    )
    .await
    .unwrap();

    // Voix des caleg au-dessus du desa saisi pour le pileg
    let err = upsert_caleg_votes(&pool, schema, 320401, &[(51, 60)])
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RekapError>(),
        Some(RekapError::TallyOverlap { conflicting: 32040101, .. })
    ));

    let tallies = load_tallies(
        &pool,
        schema,
        ContestKind::Pilpres,
        &[3204, 320401, 320402, 32040101],
    )
    .await
    .unwrap();
    let regions: BTreeSet<_> = tallies.iter().map(|t| t.region_id).collect();
    assert_eq!(regions, BTreeSet::from([320401, 320402]));
}

/// Deux sauvegardes concurrentes en conflit: une seule passe
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_concurrent_dapil_saves_serialized() {
    let schema = "peta_test_dapil_race";
    let pool = create_test_pool().expect("Failed to create pool");
    create_schema(&pool, schema, true).await.unwrap();
    seed_regions(&pool, schema).await.unwrap();

    let kecamatan = ElectoralDistrict {
        id: 0,
        name: "Bandung 1".into(),
        tier: DistrictTier::KabKota,
        seat_count: 12,
        kabupaten_id: Some(3204),
        covered_regions: BTreeSet::from([320401]),
    };
    let desa = ElectoralDistrict {
        name: "Bandung 2".into(),
        covered_regions: BTreeSet::from([32040101]),
        ..kecamatan.clone()
    };

    let (a, b) = tokio::join!(
        save_district(&pool, schema, &kecamatan),
        save_district(&pool, schema, &desa)
    );
    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);

    let districts = load_districts(&pool, schema, Some(DistrictTier::KabKota))
        .await
        .unwrap();
    assert_eq!(districts.len(), 1);
}
