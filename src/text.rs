pub(crate) const EXPIRED_COMPONENT: &str = "This component has expired, it was not used for too long. Please run the command again to get a fresh one.";

pub(crate) const UNUSABLE_COMPONENT: &str =
    "This component is no longer usable. Please run the command again.";
