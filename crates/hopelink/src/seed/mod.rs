//! CSV seed data for the in-process repositories.
//!
//! A seed directory holds `users.csv`, `donations.csv`, `requests.csv`, and optionally
//! `volunteers.csv`. List cells (tags, delivery modes) are separated by `;`.

mod parser;

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::matching::domain::{Donation, DonationRequest, UserProfile, Volunteer};
use crate::matching::memory::InMemoryMatchingRepository;
use crate::matching::repository::RepositoryError;

pub use parser::RowError;
use parser::{read_rows, DonationRow, RequestRow, UserRow, VolunteerRow};

#[derive(Debug)]
pub enum SeedImportError {
    Io { path: PathBuf, source: std::io::Error },
    Csv { file: &'static str, source: csv::Error },
    Row { file: &'static str, error: RowError },
    Repository(RepositoryError),
}

impl std::fmt::Display for SeedImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedImportError::Io { path, source } => {
                write!(f, "failed to read seed file {}: {}", path.display(), source)
            }
            SeedImportError::Csv { file, source } => {
                write!(f, "invalid CSV data in {file}: {source}")
            }
            SeedImportError::Row { file, error } => {
                write!(f, "{file} row {}: {}", error.row, error.message)
            }
            SeedImportError::Repository(err) => write!(f, "could not store seed data: {err}"),
        }
    }
}

impl std::error::Error for SeedImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedImportError::Io { source, .. } => Some(source),
            SeedImportError::Csv { source, .. } => Some(source),
            SeedImportError::Row { .. } => None,
            SeedImportError::Repository(err) => Some(err),
        }
    }
}

impl From<RepositoryError> for SeedImportError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

/// Parsed contents of a seed directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedData {
    pub users: Vec<UserProfile>,
    pub donations: Vec<Donation>,
    pub requests: Vec<DonationRequest>,
    pub volunteers: Vec<Volunteer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub users: usize,
    pub donations: usize,
    pub requests: usize,
    pub volunteers: usize,
}

impl SeedData {
    pub fn summary(&self) -> SeedSummary {
        SeedSummary {
            users: self.users.len(),
            donations: self.donations.len(),
            requests: self.requests.len(),
            volunteers: self.volunteers.len(),
        }
    }

    /// Load every record into the repository, replacing records with the same id.
    pub fn apply_to(
        self,
        repository: &InMemoryMatchingRepository,
    ) -> Result<SeedSummary, SeedImportError> {
        let summary = self.summary();
        for user in self.users {
            repository.put_user(user)?;
        }
        for donation in self.donations {
            repository.put_donation(donation)?;
        }
        for request in self.requests {
            repository.put_request(request)?;
        }
        for volunteer in self.volunteers {
            repository.put_volunteer(volunteer)?;
        }
        info!(
            users = summary.users,
            donations = summary.donations,
            requests = summary.requests,
            volunteers = summary.volunteers,
            "seed data loaded"
        );
        Ok(summary)
    }
}

const USERS: &str = "users.csv";
const DONATIONS: &str = "donations.csv";
const REQUESTS: &str = "requests.csv";
const VOLUNTEERS: &str = "volunteers.csv";

pub struct SeedImporter;

impl SeedImporter {
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<SeedData, SeedImportError> {
        let dir = dir.as_ref();
        let volunteers_path = dir.join(VOLUNTEERS);
        let volunteers = if volunteers_path.exists() {
            Some(open(&volunteers_path)?)
        } else {
            debug!(path = %volunteers_path.display(), "no volunteer seed file");
            None
        };

        Self::from_readers(
            open(&dir.join(USERS))?,
            open(&dir.join(DONATIONS))?,
            open(&dir.join(REQUESTS))?,
            volunteers,
        )
    }

    pub fn from_readers<U, D, Q, V>(
        users: U,
        donations: D,
        requests: Q,
        volunteers: Option<V>,
    ) -> Result<SeedData, SeedImportError>
    where
        U: Read,
        D: Read,
        Q: Read,
        V: Read,
    {
        let users = convert(USERS, users, UserRow::into_profile)?;
        let donations = convert(DONATIONS, donations, DonationRow::into_donation)?;
        let requests = convert(REQUESTS, requests, RequestRow::into_request)?;
        let volunteers = match volunteers {
            Some(reader) => convert(VOLUNTEERS, reader, VolunteerRow::into_volunteer)?,
            None => Vec::new(),
        };

        Ok(SeedData {
            users,
            donations,
            requests,
            volunteers,
        })
    }
}

fn open(path: &Path) -> Result<std::fs::File, SeedImportError> {
    std::fs::File::open(path).map_err(|source| SeedImportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn convert<Row, T, R>(
    file: &'static str,
    reader: R,
    into: fn(Row, usize) -> Result<T, RowError>,
) -> Result<Vec<T>, SeedImportError>
where
    Row: serde::de::DeserializeOwned,
    R: Read,
{
    let rows: Vec<Row> =
        read_rows(reader).map_err(|source| SeedImportError::Csv { file, source })?;
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| into(row, index + 1))
        .collect::<Result<Vec<T>, RowError>>()
        .map_err(|error| SeedImportError::Row { file, error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::repository::MatchingRepository;
    use crate::matching::domain::{DonationId, UserId};
    use std::io::Cursor;

    const USERS_CSV: &str = "id,display_name,role,rating_total,rating_count\n\
donor-1,Corner Pantry,donor,45,10\n\
recipient-1,,recipient,,\n";
    const DONATIONS_CSV: &str = "id,donor_id,title,category,tags,quantity,remaining_quantity,perishable,latitude,longitude,delivery_modes,status,created_at,expires_at\n\
don-1,donor-1,Canned soup,food,canned,20,,false,41.59,-93.62,pickup,available,2025-09-20T09:00:00Z,\n";
    const REQUESTS_CSV: &str = "id,requester_id,title,category,tags,quantity,urgency,latitude,longitude,delivery_mode,status,created_at,needed_by\n\
req-1,recipient-1,Soup for family,food,,6,high,41.60,-93.60,pickup,open,2025-09-21,2025-10-01\n";

    #[test]
    fn readers_convert_into_seed_data() {
        let seed = SeedImporter::from_readers(
            Cursor::new(USERS_CSV),
            Cursor::new(DONATIONS_CSV),
            Cursor::new(REQUESTS_CSV),
            None::<Cursor<&str>>,
        )
        .expect("seed parses");

        assert_eq!(
            seed.summary(),
            SeedSummary {
                users: 2,
                donations: 1,
                requests: 1,
                volunteers: 0
            }
        );
        assert_eq!(seed.users[1].display_name, "recipient-1");
        assert!((seed.users[0].reliability() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn seed_data_lands_in_repository() {
        let seed = SeedImporter::from_readers(
            Cursor::new(USERS_CSV),
            Cursor::new(DONATIONS_CSV),
            Cursor::new(REQUESTS_CSV),
            None::<Cursor<&str>>,
        )
        .expect("seed parses");
        let repository = InMemoryMatchingRepository::default();

        seed.apply_to(&repository).expect("seed applies");

        assert!(repository
            .donation(&DonationId("don-1".to_string()))
            .expect("lookup")
            .is_some());
        assert!(repository
            .user(&UserId("donor-1".to_string()))
            .expect("lookup")
            .is_some());
        assert_eq!(repository.open_requests().expect("requests").len(), 1);
    }

    #[test]
    fn bad_rows_report_file_and_row() {
        let users = "id,display_name,role,rating_total,rating_count\nu-1,,admin,,\n";
        let error = SeedImporter::from_readers(
            Cursor::new(users),
            Cursor::new(DONATIONS_CSV),
            Cursor::new(REQUESTS_CSV),
            None::<Cursor<&str>>,
        )
        .expect_err("unknown role rejected");

        match error {
            SeedImportError::Row { file, error } => {
                assert_eq!(file, "users.csv");
                assert_eq!(error.row, 1);
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }

    #[test]
    fn missing_directory_propagates_io_errors() {
        match SeedImporter::from_dir("./does-not-exist") {
            Err(SeedImportError::Io { path, .. }) => assert!(path.ends_with("users.csv")),
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
