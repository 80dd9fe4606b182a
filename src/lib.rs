pub mod config;
pub mod ingest;

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Initialize the process-wide logger. Safe to call more than once.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    pub use database::{TestDatabase, TestDatabaseError};

    pub mod database {
        use log::LevelFilter;
        use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use sqlx::{ConnectOptions, PgPool};
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database factory for integration tests.
        ///
        /// Each instance launches a disposable Postgres container, connects
        /// a pool, and applies the crate's migrations. Dropping the instance
        /// tears the container down with the data inside it.
        pub struct TestDatabase {
            pool: PgPool,
            _container: ContainerAsync<Postgres>,
        }

        impl TestDatabase {
            pub async fn new() -> Result<Self, TestDatabaseError> {
                crate::init_logger();

                let container = Postgres::default().start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let options: PgConnectOptions = url.parse().map_err(TestDatabaseError::Sqlx)?;
                let options = options.log_statements(LevelFilter::Off);

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool,
                    _container: container,
                })
            }

            /// Cloneable connection pool for use in tests.
            pub fn pool(&self) -> &PgPool {
                &self.pool
            }

            /// Convenience method returning a clone of the pooled handle.
            pub fn pool_clone(&self) -> PgPool {
                self.pool.clone()
            }

            /// Close pool connections and drop the container.
            pub async fn close(self) {
                self.pool.close().await;
            }
        }
    }
}
