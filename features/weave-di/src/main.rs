use std::{convert::Infallible, error::Error, sync::Arc};

use weave_di::{Dependencies, Plugin, Registry, Token};

#[derive(Debug)]
struct Database {
    url: Arc<String>,
}

#[derive(Debug)]
struct RequestLogger {
    prefix: &'static str,
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let database_url: Token<String> = Token::new("DatabaseUrl");
    let database: Token<Database> = Token::new("Database");

    let mut registry = Registry::new();
    registry.register_value(database_url, "postgres://localhost".to_string())?;
    registry.register(
        database,
        Plugin::new()
            .dep("url", database_url)
            .provides(|deps| async move {
                let url: Arc<String> = deps.get("url")?;
                Ok::<_, Box<dyn Error + Send + Sync>>(Database { url })
            }),
    )?;
    registry.middleware(Dependencies::new().with("db", database), |deps| {
        let db: Arc<Database> = deps.get("db")?;
        println!("Building request logger for {}", db.url);
        Ok::<_, Box<dyn Error + Send + Sync>>(RequestLogger { prefix: "[request]" })
    })?;
    registry.register_anonymous(Plugin::<()>::new().provides_sync(|_| {
        println!("Anonymous plugins always run");
        Ok::<_, Infallible>(())
    }))?;

    let container = futures::executor::block_on(registry.resolve())?;

    println!("{:?}", container);
    println!("{:?}", container.get_service(database)?);
    for logger in container.middleware().handlers::<RequestLogger>()? {
        println!("middleware: {:?} {}", logger, logger.prefix);
    }
    println!("{}", container.graph().to_dot());

    Ok(())
}
