/*!
 * Protocol layer — what a record is and where it goes.
 *
 * - `types` — the `Record` unit of delivery
 * - `input` — line reader producing trimmed records
 * - `address` — endpoint normalisation and URL building
 * - `constants` — version string, content types, subpaths
 */

pub mod address;
pub mod constants;
pub mod input;
pub mod types;
