// Library root: the season-table model and every pipeline stage, exposed for
// the CLI and for integration tests.

pub mod awards;
pub mod career;
pub mod era;
pub mod hof;
pub mod impute;
pub mod normalize;
pub mod season;
pub mod table_io;
