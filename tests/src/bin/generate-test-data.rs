//! Prints SQL filling a freshly migrated database with random users, posts,
//! comment threads, friendships and messages.

use anyhow::Context;
use chrono::{Duration, Utc};
use rand::{seq::SliceRandom, Rng};
use socialite_api::{
    ChatMessage, Comment, FriendEdge, FriendStatus, NewPost, Post, Privacy, Role, Time, User,
    UserId, DEFAULT_MAX_REPLY_DEPTH,
};
use structopt::StructOpt;
use uuid::Uuid;

#[derive(Debug, StructOpt)]
#[structopt(name = "generate-test-data")]
struct Opt {
    #[structopt(long, default_value = "10")]
    users: usize,

    #[structopt(long, default_value = "50")]
    posts: usize,

    #[structopt(long, default_value = "200")]
    comments: usize,

    #[structopt(long, default_value = "100")]
    messages: usize,

    /// Password given to every generated user
    #[structopt(long, default_value = "password")]
    password: String,
}

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Dennis", "Edsger", "Frances", "Grace", "John", "Ken", "Margaret",
    "Niklaus", "Radia",
];

/// One row of a JSON document table
fn row<T: serde::Serialize>(id: Uuid, created_at: Time, body: &T) -> anyhow::Result<String> {
    let json = serde_json::to_string(body).context("serializing row body")?;
    Ok(format!(
        "('{id}', '{}', '{}')",
        created_at.to_rfc3339(),
        json.replace('\'', "''")
    ))
}

fn print_table(table: &str, rows: &[String]) {
    if rows.is_empty() {
        return;
    }
    println!("INSERT INTO {table} (id, created_at, body) VALUES");
    println!("    {}", rows.join(",\n    "));
    println!("ON CONFLICT DO NOTHING;");
}

fn past(rng: &mut impl Rng) -> Time {
    Utc::now() - Duration::minutes(rng.gen_range(0..60 * 24 * 30))
}

fn sentence(rng: &mut impl Rng) -> String {
    lipsum::lipsum_words(rng.gen_range(3..25))
}

fn pick(rng: &mut impl Rng, users: &[User]) -> UserId {
    users.choose(rng).map(|u| u.id).unwrap_or_else(UserId::stub)
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    let mut rng = rand::thread_rng();

    let password_hash = bcrypt::hash(&opt.password, 4).context("hashing password")?;
    let users = (0..opt.users)
        .map(|i| {
            let first_name = FIRST_NAMES[i % FIRST_NAMES.len()];
            User {
                id: UserId(Uuid::new_v4()),
                email: format!("{}{i}@example.org", first_name.to_lowercase()),
                password_hash: password_hash.clone(),
                first_name: String::from(first_name),
                last_name: format!("Tester{i}"),
                birthday: None,
                gender: None,
                bio: Some(sentence(&mut rng)),
                avatar: None,
                cover_photo: None,
                role: if i == 0 { Role::Admin } else { Role::User },
                created_at: past(&mut rng),
            }
        })
        .collect::<Vec<_>>();

    // accepted friendships are stored once in each direction
    let mut edges = Vec::new();
    for (i, a) in users.iter().enumerate() {
        for b in &users[i + 1..] {
            if rng.gen_bool(0.3) {
                let edge = FriendEdge::now(a.id, b.id, FriendStatus::Accepted);
                edges.push(edge.reversed());
                edges.push(edge);
            } else if rng.gen_bool(0.1) {
                edges.push(FriendEdge::now(a.id, b.id, FriendStatus::Pending));
            }
        }
    }

    let mut posts = (0..opt.posts)
        .map(|_| {
            let mut p = Post::now(
                pick(&mut rng, &users),
                NewPost {
                    content: sentence(&mut rng),
                    privacy: if rng.gen_bool(0.2) {
                        Privacy::Private
                    } else {
                        Privacy::Public
                    },
                    ..Default::default()
                },
            );
            p.created_at = past(&mut rng);
            for u in &users {
                if rng.gen_bool(0.2) {
                    p.toggle_like(u.id);
                }
            }
            p
        })
        .collect::<Vec<_>>();

    for _ in 0..opt.comments {
        let Some(post) = posts.choose_mut(&mut rng) else {
            break;
        };
        let parents = post
            .comments
            .preorder()
            .into_iter()
            .filter(|c| post.comments.depth(c.id) < Some(DEFAULT_MAX_REPLY_DEPTH))
            .map(|c| c.id)
            .collect::<Vec<_>>();
        let parent = match rng.gen_bool(0.6) {
            true => parents.choose(&mut rng).copied(),
            false => None,
        };
        let comment = Comment::now(pick(&mut rng, &users), sentence(&mut rng), parent);
        post.comments
            .attach(comment)
            .context("attaching generated comment")?;
    }

    let messages = (0..opt.messages)
        .filter_map(|_| {
            let (from, to) = (pick(&mut rng, &users), pick(&mut rng, &users));
            (from != to).then(|| {
                let mut m = ChatMessage::now(from, to, sentence(&mut rng));
                m.created_at = past(&mut rng);
                m.read = rng.gen_bool(0.5);
                m
            })
        })
        .collect::<Vec<_>>();

    print_table(
        "users",
        &users
            .iter()
            .map(|u| row(u.id.0, u.created_at, u))
            .collect::<anyhow::Result<Vec<_>>>()?,
    );
    print_table(
        "friend_edges",
        &edges
            .iter()
            .map(|e| row(e.id.0, e.created_at, e))
            .collect::<anyhow::Result<Vec<_>>>()?,
    );
    print_table(
        "posts",
        &posts
            .iter()
            .map(|p| row(p.id.0, p.created_at, p))
            .collect::<anyhow::Result<Vec<_>>>()?,
    );
    print_table(
        "messages",
        &messages
            .iter()
            .map(|m| row(m.id.0, m.created_at, m))
            .collect::<anyhow::Result<Vec<_>>>()?,
    );
    Ok(())
}
