mod personas;
mod scenarios;

pub(crate) use personas::personas;
pub(crate) use scenarios::scenarios;
