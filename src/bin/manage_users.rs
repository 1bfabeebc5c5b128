use std::{error::Error, path::Path, process::exit};

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use finance_manager::{
    User, bump_token_version, get_user_by_email_or_username, list_users,
    revoke_all_refresh_tokens, soft_delete_user,
};

/// A utility for listing and deactivating registered users.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the active users, one page at a time.
    List(ListArgs),
    /// Deactivate a user and end all of their sessions.
    Deactivate(DeactivateArgs),
}

#[derive(Args, Debug)]
struct ListArgs {
    /// The page to show, starting from 1.
    #[arg(long, default_value_t = 1)]
    page: u64,

    /// The number of users per page.
    #[arg(long, default_value_t = 10)]
    limit: u64,
}

#[derive(Args, Debug)]
struct DeactivateArgs {
    /// The email or username of the user to deactivate.
    #[arg(long)]
    email: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let db_path = Path::new(&cli.db_path);

    if !db_path.is_file() {
        print_error(format!("File does not exist at {db_path:#?}!"));
        exit(1);
    }

    let mut conn = Connection::open(db_path)?;

    match cli.command {
        Command::List(args) => print_users(&conn, &args)?,
        Command::Deactivate(args) => {
            let user = match get_user_by_email_or_username(&args.email, &conn) {
                Ok(user) => user,
                Err(error) => {
                    print_error(format!("Could not find the user '{}': {error}", args.email));
                    exit(1);
                }
            };

            if user.is_deleted() {
                print_error(format!("{} is already deactivated.", user.email));
                exit(1);
            }

            deactivate(&mut conn, &user)?;
            println!("Deactivated {}.", user.email);
        }
    }

    Ok(())
}

fn print_users(conn: &Connection, args: &ListArgs) -> Result<(), finance_manager::Error> {
    let page = list_users(args.page, args.limit, conn)?;

    for user in &page.data {
        let username = user.username.as_ref().map_or("-", |username| username.as_str());
        println!(
            "{:>6}  {:<32}  {}",
            user.id.as_i64(),
            user.email.as_str(),
            username
        );
    }

    println!(
        "Page {} of {} ({} active users)",
        page.page, page.last_page, page.total
    );

    Ok(())
}

/// Soft-delete the user, invalidate their access tokens and revoke their
/// refresh tokens in one transaction.
fn deactivate(conn: &mut Connection, user: &User) -> Result<(), finance_manager::Error> {
    let transaction = conn.transaction()?;

    soft_delete_user(user.id, &transaction)?;
    bump_token_version(user.id, &transaction)?;
    let revoked = revoke_all_refresh_tokens(user.id, &transaction)?;

    transaction.commit()?;

    println!("Ended {revoked} active session(s).");

    Ok(())
}

fn print_error(error: impl ToString) {
    eprintln!("\x1b[31;1m{}\x1b[0m", error.to_string())
}
