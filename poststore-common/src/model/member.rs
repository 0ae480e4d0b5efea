/// Marks ids of members, the authors of posts.
///
/// Members live outside this workspace; their ids are carried as-is and never
/// checked against a member table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct MemberMarker;
