use users_core::{
    GatewayConfig, NewUser, ServiceError, SharedConnection, StoreError, TimeoutScope, UserService,
    LIMIT,
};

fn memory_db() -> SharedConnection {
    SharedConnection::new(GatewayConfig::in_memory())
}

fn count_users(db: &SharedConnection) -> i64 {
    let conn = db.connection().unwrap();
    conn.query_row("SELECT count(*) FROM Users;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn get_users_returns_at_most_limit_rows_strictly_older() {
    let db = memory_db();
    let service = UserService::new(&db);
    let batch: Vec<NewUser> = (0..25)
        .map(|age| NewUser::new(format!("user{age}"), "Tester", age))
        .collect();
    service.add_users(&batch).unwrap();

    for age_from in [-1, 0, 5, 14, 20, 24, 100] {
        let users = service.get_users(age_from).unwrap();
        assert!(users.len() <= LIMIT as usize);
        assert!(users.iter().all(|user| user.age > age_from));
    }
    assert_eq!(service.get_users(5).unwrap().len(), 10);
    assert_eq!(service.get_users(20).unwrap().len(), 4);
    assert!(service.get_users(24).unwrap().is_empty());
}

#[test]
fn get_users_is_stable_without_writes() {
    let db = memory_db();
    let service = UserService::new(&db);
    service
        .add_users(&[
            NewUser::new("Ana", "Lopez", 30),
            NewUser::new("Ben", "Ruiz", 4),
            NewUser::new("Cid", "Mora", 60),
        ])
        .unwrap();

    let first = service.get_users(5).unwrap();
    let second = service.get_users(5).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[test]
fn user_by_name_round_trip_and_miss() {
    let db = memory_db();
    let service = UserService::new(&db);
    let ids = service
        .add_users(&[NewUser::new("Ana", "Lopez", 31)])
        .unwrap();

    let ana = service.get_user_by_name("Ana").unwrap().unwrap();
    assert_eq!(ana.id, ids[0]);
    assert_eq!(ana.last_name, "Lopez");
    assert_eq!(ana.age, 31);
    assert_eq!(ana.key, None);

    assert!(service.get_user_by_name("Zzyzx").unwrap().is_none());
}

#[test]
fn get_by_names_keeps_input_order_with_explicit_misses() {
    let db = memory_db();
    let service = UserService::new(&db);
    service
        .add_users(&[
            NewUser::new("Ana", "Lopez", 31),
            NewUser::new("O'Brien", "Kelly", 44),
        ])
        .unwrap();

    let found = service
        .get_by_names(["O'Brien", "Zzyzx", "Ana"])
        .unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(found[0].as_ref().unwrap().last_name, "Kelly");
    assert!(found[1].is_none());
    assert_eq!(found[2].as_ref().unwrap().name, "Ana");

    let names = vec!["Ana".to_string()];
    assert_eq!(service.get_by_names(&names).unwrap().len(), 1);
    assert!(service.get_by_names(Vec::<String>::new()).unwrap().is_empty());
}

#[test]
fn add_users_commits_whole_batch_in_input_order() {
    let db = memory_db();
    let service = UserService::new(&db);

    let ids = service
        .add_users(&[
            NewUser::new("Ana", "Lopez", 31),
            NewUser::new("Ben", "Ruiz", 22),
            NewUser::new("Cid", "Mora", 45),
        ])
        .unwrap();

    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    let found = service.get_by_names(["Ana", "Ben", "Cid"]).unwrap();
    for (user, id) in found.iter().zip(&ids) {
        assert_eq!(user.as_ref().unwrap().id, *id);
    }
    assert_eq!(count_users(&db), 3);
}

#[test]
fn add_users_rolls_back_everything_when_one_insert_fails() {
    let db = memory_db();
    let service = UserService::new(&db);
    service
        .add_users(&[NewUser::new("Existing", "Row", 50)])
        .unwrap();

    let err = service
        .add_users(&[
            NewUser::new("Ana", "Lopez", 31),
            NewUser::new("Bad", "Age", -1),
            NewUser::new("Cid", "Mora", 45),
        ])
        .unwrap_err();

    match err {
        ServiceError::BatchInsert(batch) => {
            assert_eq!(batch.failed_index, Some(1));
            assert_eq!(batch.batch_len, 3);
            assert!(batch.source.is_constraint_violation());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(service.get_user_by_name("Ana").unwrap().is_none());
    assert!(service.get_user_by_name("Cid").unwrap().is_none());
    assert_eq!(count_users(&db), 1);

    let retried = service
        .add_users(&[NewUser::new("Ana", "Lopez", 31)])
        .unwrap();
    assert_eq!(retried.len(), 1);
}

#[test]
fn add_users_with_empty_batch_returns_no_ids() {
    let db = memory_db();
    let service = UserService::new(&db);

    assert!(service.add_users(&[]).unwrap().is_empty());
    assert_eq!(count_users(&db), 0);
}

#[test]
fn expired_transaction_deadline_rolls_back_batch() {
    let config = GatewayConfig {
        transaction_timeout_ms: 0,
        ..GatewayConfig::in_memory()
    };
    let db = SharedConnection::new(config);
    let service = UserService::new(&db);

    let err = service
        .add_users(&[
            NewUser::new("Ana", "Lopez", 31),
            NewUser::new("Ben", "Ruiz", 22),
        ])
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::BatchInsert(ref batch)
            if batch.failed_index == Some(0)
                && matches!(
                    batch.source,
                    StoreError::Timeout {
                        scope: TimeoutScope::Transaction,
                        ..
                    }
                )
    ));
    assert_eq!(count_users(&db), 0);
}

#[test]
fn new_users_parsed_from_request_payload_can_be_added() {
    let db = memory_db();
    let service = UserService::new(&db);
    let batch: Vec<NewUser> = serde_json::from_str(
        r#"[{"name":"Ana","lastName":"Lopez","age":31},{"name":"Ben","lastName":"Ruiz","age":22}]"#,
    )
    .unwrap();

    let ids = service.add_users(&batch).unwrap();
    assert_eq!(ids.len(), 2);

    let users = service.get_users(0).unwrap();
    let json = serde_json::to_value(&users).unwrap();
    assert_eq!(json[0]["lastName"], "Lopez");
    assert_eq!(json[1]["name"], "Ben");
}

#[test]
fn interrupted_insert_rolls_back_batch() {
    let config = GatewayConfig {
        statement_timeout_ms: 50,
        ..GatewayConfig::in_memory()
    };
    let db = SharedConnection::new(config);
    {
        // Triggers cannot hold a WITH clause, so the slow body is a cross
        // join over a plain table.
        let conn = db.connection().unwrap();
        conn.execute_batch(
            "CREATE TABLE seq (x INTEGER NOT NULL);
             INSERT INTO seq (x)
                 WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 1000)
                 SELECT x FROM n;
             CREATE TRIGGER slow_insert BEFORE INSERT ON Users
             WHEN NEW.name = 'Slow'
             BEGIN
                 SELECT count(*) FROM seq a, seq b, seq c;
             END;",
        )
        .unwrap();
    }
    let service = UserService::new(&db);

    let err = service
        .add_users(&[
            NewUser::new("Ana", "Lopez", 31),
            NewUser::new("Slow", "Insert", 22),
            NewUser::new("Cid", "Mora", 45),
        ])
        .unwrap_err();

    match err {
        ServiceError::BatchInsert(batch) => {
            assert_eq!(batch.failed_index, Some(1));
            assert!(matches!(
                batch.source,
                StoreError::Timeout {
                    scope: TimeoutScope::Statement,
                    ..
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count_users(&db), 0);

    let ids = service
        .add_users(&[NewUser::new("Ana", "Lopez", 31)])
        .unwrap();
    assert_eq!(ids.len(), 1);
}
