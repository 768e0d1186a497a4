//! End-to-end tests for the factory resolution and generation pipeline

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use fabriq::prelude::*;
use fabriq::Persister;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct User {
    #[serde(default)]
    id: Option<i64>,
    name: String,
    email: String,
    active: bool,
    role: String,
}

impl Model for User {
    fn table() -> &'static str {
        "users"
    }

    fn model_name() -> &'static str {
        "User"
    }

    fn set_primary_key(&mut self, key: &Value) -> FactoryResult<()> {
        self.id = serde_json::from_value(key.clone())?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Post {
    #[serde(default)]
    id: Option<i64>,
    title: String,
    user_id: i64,
}

impl Model for Post {
    fn table() -> &'static str {
        "posts"
    }

    fn model_name() -> &'static str {
        "Post"
    }

    fn set_primary_key(&mut self, key: &Value) -> FactoryResult<()> {
        self.id = serde_json::from_value(key.clone())?;
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup() -> (Factory, Arc<MemoryPersister>) {
    init_tracing();
    let persister = Arc::new(MemoryPersister::new());
    let factory = Factory::new(Arc::clone(&persister) as Arc<dyn Persister>);

    factory.define::<User, _>(|faker, _| {
        let mut attrs = fabriq::attributes! {
            "name" => "X",
            "active" => false,
            "role" => "member",
        };
        attrs.insert(
            "email".to_string(),
            Attribute::literal(format!("{}@example.com", faker.uuid())),
        );
        attrs
    });

    factory.state::<User>("admin", fabriq::attributes! { "active" => true, "role" => "admin" });

    factory.define::<Post, _>(|faker, _| {
        fabriq::attributes! {
            "title" => faker.uuid(),
            "user_id" => 0,
        }
    });

    (factory, persister)
}

#[tokio::test]
async fn raw_without_times_yields_a_single_mapping() {
    let (factory, _) = setup();

    let raw = factory
        .of::<User>()
        .raw(AttributeMap::new())
        .await
        .unwrap();

    match raw {
        Generated::One(mapping) => {
            assert_eq!(mapping.get("name"), Some(&json!("X")));
            assert_eq!(mapping.get("active"), Some(&json!(false)));
        }
        Generated::Many(_) => panic!("expected a single mapping"),
    }
}

#[tokio::test]
async fn raw_with_times_yields_independent_mappings() {
    let (factory, _) = setup();

    let mappings = factory
        .of::<User>()
        .times(3)
        .raw(AttributeMap::new())
        .await
        .unwrap()
        .into_vec();

    assert_eq!(mappings.len(), 3);
    let emails: Vec<&Value> = mappings.iter().filter_map(|m| m.get("email")).collect();
    assert_ne!(emails[0], emails[1]);
    assert_ne!(emails[1], emails[2]);
}

#[tokio::test]
async fn counts_below_one_yield_empty_batches() {
    let (factory, persister) = setup();

    let raw = factory
        .of::<User>()
        .times(0)
        .raw(AttributeMap::new())
        .await
        .unwrap();
    assert_eq!(raw, Generated::Many(Vec::new()));

    let made = factory
        .of::<User>()
        .times(-3)
        .make(AttributeMap::new())
        .await
        .unwrap();
    assert!(matches!(made, Generated::Many(ref v) if v.is_empty()));

    let created = factory
        .of::<User>()
        .times(0)
        .create(AttributeMap::new())
        .await
        .unwrap();
    assert!(created.is_empty());
    assert_eq!(persister.count("users"), 0);
}

#[tokio::test]
async fn make_without_times_yields_one_unsaved_instance() {
    let (factory, persister) = setup();

    let made = factory.of::<User>().make(AttributeMap::new()).await.unwrap();

    match made {
        Generated::One(user) => {
            assert_eq!(user.name, "X");
            assert_eq!(user.id, None);
        }
        Generated::Many(_) => panic!("expected a single instance"),
    }
    assert_eq!(persister.count("users"), 0);
}

#[tokio::test]
async fn states_apply_and_overrides_win() {
    let (factory, _) = setup();

    let with_state = factory
        .of::<User>()
        .state("admin")
        .make(AttributeMap::new())
        .await
        .unwrap()
        .one()
        .unwrap();
    assert_eq!(with_state.name, "X");
    assert!(with_state.active);

    let with_override = factory
        .of::<User>()
        .state("admin")
        .make(fabriq::attributes! { "active" => false })
        .await
        .unwrap()
        .one()
        .unwrap();
    assert_eq!(with_override.name, "X");
    assert!(!with_override.active);
    assert_eq!(with_override.role, "admin");
}

#[tokio::test]
async fn later_states_override_earlier_ones() {
    let (factory, _) = setup();
    factory.state::<User>("editor", fabriq::attributes! { "role" => "editor" });

    let user = factory
        .of::<User>()
        .states(["admin", "editor"])
        .make(AttributeMap::new())
        .await
        .unwrap()
        .one()
        .unwrap();
    assert_eq!(user.role, "editor");
    assert!(user.active);

    let reversed = factory
        .of::<User>()
        .state("editor")
        .state("admin")
        .make(AttributeMap::new())
        .await
        .unwrap()
        .one()
        .unwrap();
    assert_eq!(reversed.role, "admin");
}

#[tokio::test]
async fn unknown_state_is_an_error() {
    let (factory, _) = setup();

    let result = factory
        .of::<User>()
        .state("ghost")
        .make(AttributeMap::new())
        .await;

    match result {
        Err(FactoryError::UnknownState { model, state }) => {
            assert_eq!(model, "User");
            assert_eq!(state, "ghost");
        }
        other => panic!("expected UnknownState, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn callback_only_states_are_accepted_without_attributes() {
    let (factory, _) = setup();
    let ran = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&ran);
    factory.after_making_state::<User, _>("vip", move |_, _| {
        *flag.lock().unwrap() = true;
    });

    let user = factory
        .of::<User>()
        .state("vip")
        .make(AttributeMap::new())
        .await
        .unwrap()
        .one()
        .unwrap();

    assert_eq!(user.role, "member");
    assert!(*ran.lock().unwrap());
}

#[tokio::test]
async fn unknown_definition_is_an_error() {
    let (factory, _) = setup();

    let result = factory
        .of_definition::<User>("trimmed")
        .raw(AttributeMap::new())
        .await;

    match result {
        Err(FactoryError::UnknownDefinition { model, name }) => {
            assert_eq!(model, "User");
            assert_eq!(name, "trimmed");
        }
        other => panic!("expected UnknownDefinition, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn named_definitions_resolve_independently() {
    let (factory, _) = setup();
    factory.define_as::<User, _>("minimal", |_, _| {
        fabriq::attributes! {
            "name" => "min",
            "email" => "min@example.com",
            "active" => true,
            "role" => "none",
        }
    });

    let user = factory
        .of_definition::<User>("minimal")
        .make(AttributeMap::new())
        .await
        .unwrap()
        .one()
        .unwrap();
    assert_eq!(user.name, "min");
}

#[tokio::test]
async fn callbacks_fire_in_name_order_around_persistence() {
    let (factory, _) = setup();
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let making_log = Arc::clone(&log);
    factory.after_making::<User, _>(move |user, _| {
        assert_eq!(user.id, None, "after-making runs before persistence");
        making_log.lock().unwrap().push("making:default".to_string());
    });

    let making_admin_log = Arc::clone(&log);
    factory.after_making_state::<User, _>("admin", move |_, _| {
        making_admin_log.lock().unwrap().push("making:admin".to_string());
    });

    let creating_log = Arc::clone(&log);
    factory.after_creating::<User, _>(move |user, _| {
        assert!(user.id.is_some(), "after-creating runs after persistence");
        creating_log.lock().unwrap().push("creating:default".to_string());
    });

    let creating_admin_log = Arc::clone(&log);
    factory.after_creating_state::<User, _>("admin", move |_, _| {
        creating_admin_log
            .lock()
            .unwrap()
            .push("creating:admin".to_string());
    });

    factory
        .of::<User>()
        .state("admin")
        .create(AttributeMap::new())
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "making:default",
            "making:admin",
            "creating:default",
            "creating:admin",
        ]
    );
}

#[tokio::test]
async fn batch_callbacks_fire_once_per_instance_before_store() {
    let (factory, _) = setup();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let making = Arc::clone(&log);
    factory.after_making::<User, _>(move |_, _| making.lock().unwrap().push("making"));
    let creating = Arc::clone(&log);
    factory.after_creating::<User, _>(move |_, _| creating.lock().unwrap().push("creating"));

    factory
        .of::<User>()
        .times(2)
        .create(AttributeMap::new())
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["making", "making", "creating", "creating"]
    );
}

#[tokio::test]
async fn create_persists_and_backfills_the_primary_key() {
    let (factory, persister) = setup();

    let user = factory
        .of::<User>()
        .create(AttributeMap::new())
        .await
        .unwrap()
        .one()
        .unwrap();

    assert_eq!(user.id, Some(1));
    let rows = persister.rows("users");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&json!(1)));
}

#[tokio::test]
async fn connection_override_reaches_the_persister() {
    let (factory, persister) = setup();

    factory
        .of::<User>()
        .connection("replica")
        .create(AttributeMap::new())
        .await
        .unwrap();

    assert_eq!(persister.count("users"), 0);
    assert_eq!(persister.rows_on("replica", "users").len(), 1);
}

#[tokio::test]
async fn deferred_attributes_see_resolved_values() {
    let (factory, _) = setup();

    let mut overrides = fabriq::attributes! { "name" => "Nia" };
    overrides.insert(
        "email".to_string(),
        Attribute::deferred(|attrs| {
            let name = attrs
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            json!(format!("{}@deferred.test", name.to_lowercase()))
        }),
    );

    let user = factory
        .of::<User>()
        .make(overrides)
        .await
        .unwrap()
        .one()
        .unwrap();

    assert_eq!(user.email, "nia@deferred.test");
}

#[tokio::test]
async fn nested_builders_resolve_to_created_keys() {
    let (factory, persister) = setup();

    let mut overrides = fabriq::attributes! { "title" => "hello" };
    overrides.insert(
        "user_id".to_string(),
        Attribute::factory(factory.of::<User>()),
    );

    let post = factory
        .of::<Post>()
        .create(overrides)
        .await
        .unwrap()
        .one()
        .unwrap();

    let users = persister.rows("users");
    assert_eq!(users.len(), 1);
    assert_eq!(json!(post.user_id), users[0]["id"]);
}

#[tokio::test]
async fn entity_references_resolve_to_their_keys() {
    let (factory, _) = setup();

    let author = factory
        .of::<User>()
        .create(AttributeMap::new())
        .await
        .unwrap()
        .one()
        .unwrap();
    let author_id = author.id.unwrap();

    let mut overrides = fabriq::attributes! { "title" => "ref" };
    overrides.insert("user_id".to_string(), Attribute::reference(author));

    let post = factory
        .of::<Post>()
        .make(overrides)
        .await
        .unwrap()
        .one()
        .unwrap();

    assert_eq!(post.user_id, author_id);
}

#[tokio::test]
async fn unsaved_entity_references_fail_with_missing_key() {
    let (factory, _) = setup();

    let unsaved = factory
        .of::<User>()
        .make(AttributeMap::new())
        .await
        .unwrap()
        .one()
        .unwrap();

    let mut overrides = fabriq::attributes! { "title" => "dangling" };
    overrides.insert("user_id".to_string(), Attribute::reference(unsaved));

    let result = factory.of::<Post>().make(overrides).await;
    assert!(matches!(
        result,
        Err(FactoryError::MissingPrimaryKey("User"))
    ));
}

#[tokio::test]
async fn lazy_defers_the_create_call() {
    let (factory, persister) = setup();

    let deferred = factory
        .of::<User>()
        .state("admin")
        .lazy(fabriq::attributes! { "name" => "Later" });
    assert_eq!(persister.count("users"), 0);

    let user = deferred.call().await.unwrap().one().unwrap();
    assert_eq!(user.name, "Later");
    assert!(user.active);
    assert_eq!(persister.count("users"), 1);
}

struct RefusingPersister;

#[async_trait::async_trait]
impl Persister for RefusingPersister {
    async fn insert(
        &self,
        _table: &str,
        _key_column: &str,
        _connection: Option<&str>,
        _row: &ResolvedMap,
    ) -> FactoryResult<serde_json::Value> {
        Err(FactoryError::Persistence("connection refused".to_string()))
    }
}

#[tokio::test]
async fn persistence_failures_propagate_and_skip_after_creating() {
    init_tracing();
    let factory = Factory::new(Arc::new(RefusingPersister));
    factory.define::<User, _>(|_, _| {
        fabriq::attributes! {
            "name" => "X",
            "email" => "x@example.com",
            "active" => false,
            "role" => "member",
        }
    });

    let made = Arc::new(Mutex::new(0));
    let making = Arc::clone(&made);
    factory.after_making::<User, _>(move |_, _| *making.lock().unwrap() += 1);

    let created = Arc::new(Mutex::new(0));
    let creating = Arc::clone(&created);
    factory.after_creating::<User, _>(move |_, _| *creating.lock().unwrap() += 1);

    let result = factory.of::<User>().times(2).create(AttributeMap::new()).await;

    match result {
        Err(FactoryError::Persistence(message)) => {
            assert_eq!(message, "connection refused");
        }
        other => panic!("expected Persistence, got {:?}", other.map(|_| ())),
    }
    assert_eq!(*made.lock().unwrap(), 2);
    assert_eq!(*created.lock().unwrap(), 0);
}

#[tokio::test]
async fn builders_are_reusable_across_generation_calls() {
    let (factory, persister) = setup();

    let builder = factory.of::<User>().times(2);
    builder.create(AttributeMap::new()).await.unwrap();
    builder.create(AttributeMap::new()).await.unwrap();

    assert_eq!(persister.count("users"), 4);
}
