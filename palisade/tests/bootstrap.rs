use palisade_common::{PalisadeConfig, Secret, SecurityProfile};
use palisade_core::db::{connect_to_db, populate_db};

// Exercises the same dependency graph as the binary: the default sqlite
// feature must pull in a working sea-orm backend end to end.
#[tokio::test]
async fn default_build_connects_migrates_and_seeds_sqlite() {
    let path = std::env::temp_dir().join(format!(
        "palisade-bootstrap-{}.sqlite3",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);

    let mut config = PalisadeConfig::for_profile(
        SecurityProfile::Relaxed,
        Secret::new("a-bootstrap-test-secret-of-32-b!".to_owned()),
    );
    config.store.database_url = Secret::new(format!("sqlite:{}", path.display()));

    let db = connect_to_db(&config).await.unwrap();
    populate_db(&db).await.unwrap();
    // Seeding twice must not duplicate the built-in roles
    populate_db(&db).await.unwrap();

    drop(db);
    let _ = std::fs::remove_file(&path);
}
