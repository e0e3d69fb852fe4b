use anyhow::{anyhow, Context};
use socialite_api::{Account, AuthToken, Error as ApiError, NewAccount, NewUser, Role, Uuid};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long)]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Create a user
    CreateUser {
        email: String,

        first_name: String,

        last_name: String,

        /// Initial password
        initial_password: String,

        /// Give the user the admin role
        #[structopt(long)]
        admin: bool,
    },

    /// List all accounts
    ListUsers,
}

fn admin_token() -> anyhow::Result<AuthToken> {
    let tok =
        std::env::var("ADMIN_TOKEN").context("retrieving ADMIN_TOKEN environment variable")?;
    let tok = Uuid::try_parse(&tok).context("parsing ADMIN_TOKEN as an auth token")?;
    Ok(AuthToken(tok))
}

/// Turns error responses into their api error
async fn check(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.bytes().await.context("reading error response")?;
    match ApiError::parse(&body) {
        Ok(err) => Err(anyhow!(err)),
        Err(_) => Err(anyhow!("server answered {status}: {body:?}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = <Opt as structopt::StructOpt>::from_args();

    let client = reqwest::Client::new();

    match opt.cmd {
        Command::CreateUser {
            email,
            first_name,
            last_name,
            initial_password,
            admin,
        } => {
            let resp = client
                .post(format!("{}/api/admin/create-user", opt.host))
                .json(&NewAccount {
                    user: NewUser {
                        email,
                        password: initial_password,
                        first_name,
                        last_name,
                        birthday: None,
                        gender: None,
                    },
                    role: if admin { Role::Admin } else { Role::User },
                })
                .bearer_auth(admin_token()?.0)
                .send()
                .await?;
            let account: Account = check(resp).await?.json().await?;
            println!("created user {}", account.id.0);
        }
        Command::ListUsers => {
            let resp = client
                .get(format!("{}/api/admin/users", opt.host))
                .bearer_auth(admin_token()?.0)
                .send()
                .await?;
            let accounts: Vec<Account> = check(resp).await?.json().await?;
            for a in accounts {
                println!(
                    "{}\t{}\t{:?}\t{} {}",
                    a.id.0, a.email, a.role, a.first_name, a.last_name
                );
            }
        }
    }

    Ok(())
}
