use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use microblog::{config, db};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "Admin CLI for the microblog database")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a user account
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Make one user follow another
    Follow { follower: String, followed: String },
    /// Remove a follow edge
    Unfollow { follower: String, followed: String },
    /// Publish a post as a user
    Post { username: String, body: String },
    /// Print a user's feed (own posts plus followed users' posts)
    Feed { username: String },
    /// Show a user's profile, avatar URL and follow counts
    Whois { username: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    match args.command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let res = db::create_user(&pool, &username, &email, password.as_deref()).await;
            match res {
                Ok(id) => println!("created user {} (id {})", username, id),
                Err(err) if db::is_unique_violation(&err) => {
                    return Err(anyhow!("username or email already taken"));
                }
                Err(err) => return Err(err),
            }
        }
        Command::Follow { follower, followed } => {
            let (a, b) = lookup_pair(&pool, &follower, &followed).await?;
            db::follow(&pool, a.id, b.id).await?;
            println!("{} now follows {}", follower, followed);
        }
        Command::Unfollow { follower, followed } => {
            let (a, b) = lookup_pair(&pool, &follower, &followed).await?;
            db::unfollow(&pool, a.id, b.id).await?;
            println!("{} no longer follows {}", follower, followed);
        }
        Command::Post { username, body } => {
            let user = lookup(&pool, &username).await?;
            let id = db::create_post(&pool, user.id, &body).await?;
            println!("post {} published", id);
        }
        Command::Feed { username } => {
            let user = lookup(&pool, &username).await?;
            for post in db::followed_posts(&pool, user.id).await? {
                let author = db::get_user(&pool, post.user_id)
                    .await?
                    .map(|u| u.username)
                    .unwrap_or_else(|| "?".to_string());
                println!("[{}] {}: {}", post.timestamp, author, post.body);
            }
        }
        Command::Whois { username } => {
            let user = lookup(&pool, &username).await?;
            println!("{} <{}>", user.username, user.email);
            if let Some(about) = &user.about_me {
                println!("  about: {}", about);
            }
            println!("  avatar: {}", user.avatar(128));
            println!(
                "  followers: {}, following: {}",
                db::followers_count(&pool, user.id).await?,
                db::following_count(&pool, user.id).await?
            );
            println!("  last seen: {}", user.last_seen);
        }
    }

    Ok(())
}

async fn lookup(pool: &db::Pool, username: &str) -> Result<db::User> {
    db::get_user_by_username(pool, username)
        .await?
        .ok_or_else(|| anyhow!("no such user: {username}"))
}

async fn lookup_pair(
    pool: &db::Pool,
    first: &str,
    second: &str,
) -> Result<(db::User, db::User)> {
    Ok((lookup(pool, first).await?, lookup(pool, second).await?))
}
