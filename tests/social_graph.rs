use microblog::db;
use microblog::session::AuthSession;

async fn setup_pool() -> db::Pool {
    let pool = db::init_pool("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

#[tokio::test]
async fn feed_scenario_two_users() {
    let pool = setup_pool().await;
    let u1 = db::create_user(&pool, "kev", "kev@x.com", None).await.unwrap();
    let u2 = db::create_user(&pool, "ana", "ana@x.com", None).await.unwrap();

    db::create_post(&pool, u1, "hello").await.unwrap();
    db::create_post(&pool, u2, "world").await.unwrap();
    db::follow(&pool, u1, u2).await.unwrap();

    let feed = db::followed_posts(&pool, u1).await.unwrap();
    let bodies: Vec<_> = feed.iter().map(|p| p.body.as_str()).collect();
    assert_eq!(bodies, vec!["world", "hello"]);
}

#[tokio::test]
async fn loner_sees_only_their_own_posts() {
    let pool = setup_pool().await;
    let u1 = db::create_user(&pool, "kev", "kev@x.com", None).await.unwrap();
    let u2 = db::create_user(&pool, "ana", "ana@x.com", None).await.unwrap();

    db::create_post(&pool, u1, "mine").await.unwrap();
    db::create_post(&pool, u2, "not mine").await.unwrap();

    let feed = db::followed_posts(&pool, u1).await.unwrap();
    let bodies: Vec<_> = feed.iter().map(|p| p.body.as_str()).collect();
    assert_eq!(bodies, vec!["mine"]);
}

#[tokio::test]
async fn duplicate_registration_rejected() {
    let pool = setup_pool().await;
    db::create_user(&pool, "kev", "kev@x.com", None).await.unwrap();
    let err = db::create_user(&pool, "kev", "kev2@x.com", None)
        .await
        .unwrap_err();
    assert!(db::is_unique_violation(&err));
}

#[tokio::test]
async fn password_follows_most_recent_set() {
    let pool = setup_pool().await;
    let id = db::create_user(&pool, "kev", "kev@x.com", Some("one")).await.unwrap();

    db::set_password(&pool, id, "two").await.unwrap();
    db::set_password(&pool, id, "three").await.unwrap();

    let user = db::get_user(&pool, id).await.unwrap().unwrap();
    assert!(user.check_password("three"));
    assert!(!user.check_password("one"));
    assert!(!user.check_password("two"));
}

#[tokio::test]
async fn avatar_is_stable_across_email_case() {
    let pool = setup_pool().await;
    let a = db::create_user(&pool, "kev", "KEV@X.COM", None).await.unwrap();
    let b = db::create_user(&pool, "kev2", "kev@x2.com", None).await.unwrap();

    let a = db::get_user(&pool, a).await.unwrap().unwrap();
    let b = db::get_user(&pool, b).await.unwrap().unwrap();

    assert_eq!(
        a.avatar(128),
        "https://www.gravatar.com/avatar/cee848f9777bedee9ee8c2ef98df529c?d=identicon&s=128"
    );
    assert_ne!(a.avatar(128), b.avatar(128));
    assert_eq!(a.avatar(128), a.avatar(128));
}

#[tokio::test]
async fn session_resolves_current_user_from_pool() {
    let pool = setup_pool().await;
    let id = db::create_user(&pool, "kev", "kev@x.com", Some("secret")).await.unwrap();

    let logged_in = db::authenticate(&pool, "kev", "secret").await.unwrap().unwrap();
    let mut session = AuthSession::new(pool.clone());
    session.log_in(logged_in.id);

    let current = session.current_user().await.unwrap().unwrap();
    assert_eq!(current.id, id);
    assert_eq!(current.username, "kev");

    // deleting the account invalidates the session's user lookup
    db::delete_user(&pool, id).await.unwrap();
    assert!(session.current_user().await.unwrap().is_none());
}

#[tokio::test]
async fn follow_graph_queries() {
    let pool = setup_pool().await;
    let kev = db::create_user(&pool, "kev", "kev@x.com", None).await.unwrap();
    let ana = db::create_user(&pool, "ana", "ana@x.com", None).await.unwrap();
    let bob = db::create_user(&pool, "bob", "bob@x.com", None).await.unwrap();

    db::follow(&pool, kev, ana).await.unwrap();
    db::follow(&pool, kev, bob).await.unwrap();
    db::follow(&pool, bob, ana).await.unwrap();

    let followed: Vec<_> = db::followed_users(&pool, kev)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(followed, vec!["ana", "bob"]);

    let fans: Vec<_> = db::followers_of(&pool, ana)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(fans, vec!["bob", "kev"]);

    assert_eq!(db::followers_count(&pool, ana).await.unwrap(), 2);
    assert_eq!(db::following_count(&pool, kev).await.unwrap(), 2);
}

#[tokio::test]
async fn profile_edits_are_visible() {
    let pool = setup_pool().await;
    let id = db::create_user(&pool, "kev", "kev@x.com", None).await.unwrap();
    let before = db::get_user(&pool, id).await.unwrap().unwrap();

    db::update_about_me(&pool, id, Some("rustacean")).await.unwrap();
    db::touch_last_seen(&pool, id).await.unwrap();

    let after = db::get_user(&pool, id).await.unwrap().unwrap();
    assert_eq!(after.about_me.as_deref(), Some("rustacean"));
    assert!(after.last_seen >= before.last_seen);

    db::update_about_me(&pool, id, None).await.unwrap();
    let cleared = db::get_user(&pool, id).await.unwrap().unwrap();
    assert!(cleared.about_me.is_none());
}
