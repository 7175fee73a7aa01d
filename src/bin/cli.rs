// ReadHub Core - Book catalog client data layer
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use readhub_core::config::ClientConfig;
use readhub_core::models::{Book, BookCreate, PaginatedResult, PaginationPatch};
use readhub_core::search::SearchMode;
use readhub_core::storage::{Database, Session};
use readhub_core::Catalog;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "readhub-cli")]
#[command(about = "ReadHub CLI - Browse the book catalog from a terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List books
    List {
        #[arg(short, long, default_value_t = 0)]
        page: u32,
        #[arg(short, long, default_value_t = 20)]
        size: u32,
    },
    /// Show one book
    Get {
        /// Book id
        id: String,
    },
    /// Search in one of the four modes
    Search {
        /// text, id, category or language
        #[arg(short, long, default_value = "text")]
        mode: SearchMode,
        query: String,
        #[arg(short, long, default_value_t = 0)]
        page: u32,
    },
    /// Total number of books
    Count,
    /// Check whether a book exists
    Exists {
        id: String,
    },
    /// Create a book
    Create {
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long)]
        language: String,
        #[arg(short, long = "author")]
        authors: Vec<String>,
        #[arg(short, long = "category")]
        categories: Vec<String>,
    },
    /// Delete a book
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("readhub_core=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("Invalid configuration")?;

    let session = match &config.database_path {
        Some(path) => {
            let db = Database::new(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Session::load(db).await.context("Failed to load session")?
        }
        None => Session::anonymous(),
    };

    let catalog = Catalog::from_config(&config, Arc::new(session))?;

    match cli.command {
        Commands::List { page, size } => {
            let result = catalog.list_books(PaginationPatch::page(page, size)).await;
            print_page(result.into_result()?);
        }
        Commands::Get { id } => {
            match catalog.book(&id).await.into_result()? {
                Some(book) => print_book(&book),
                None => bail!("No book id given"),
            }
        }
        Commands::Search { mode, query, page } => {
            let result = catalog
                .search_mode(mode, &query, PaginationPatch::page(page, 20))
                .await;
            if result.is_idle() {
                println!("Query \"{}\" is not a valid {} search", query, mode);
                return Ok(());
            }
            print_page(result.into_result()?);
        }
        Commands::Count => {
            let count = catalog.count().await.into_result()?.unwrap_or(0);
            println!("{} books", count);
        }
        Commands::Exists { id } => {
            let exists = catalog.exists(&id).await.into_result()?.unwrap_or(false);
            println!("{}", if exists { "yes" } else { "no" });
        }
        Commands::Create {
            title,
            description,
            language,
            authors,
            categories,
        } => {
            let mut data = BookCreate::new(title, language);
            data.description = description;
            for author in authors {
                data = data.with_author(author);
            }
            for category in categories {
                data = data.with_category(category);
            }
            let book = catalog.create_book(data).await?;
            println!("✓ Created {}", book.id);
            print_book(&book);
        }
        Commands::Delete { id } => {
            catalog.delete_book(&id).await?;
            println!("✓ Deleted {}", id);
        }
    }

    Ok(())
}

fn print_page(page: Option<PaginatedResult<Book>>) {
    let Some(page) = page else {
        println!("No results");
        return;
    };
    println!(
        "Page {}/{} ({} books total)",
        page.number + 1,
        page.total_pages.max(1),
        page.total_elements
    );
    for book in &page.content {
        println!("  {}  {}  by {}", book.id, book.title, book.author_names());
    }
}

fn print_book(book: &Book) {
    println!("{}", book.title);
    println!("  id:         {}", book.id);
    println!("  authors:    {}", book.author_names());
    println!("  language:   {}", book.language);
    println!("  categories: {}", book.categories.join(", "));
    println!("  status:     {}", book.status.as_str());
    println!("  rating:     {:.1} ({} reviews)", book.average_rating, book.review_count);
    println!("  downloads:  {}", book.download_count);
}
