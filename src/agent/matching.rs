//! Gig selection against the agent's declared capabilities.
//!
//! Selection is a linear scan in listing order, first match wins:
//! 1. gigs whose required capabilities are a subset of what the agent
//!    declares (a gig with no requirements satisfies any agent),
//! 2. gigs whose category, title, description, or requirement tags mention
//!    one of the agent's capabilities,
//! 3. any remaining gig, as a last resort.
//!
//! An agent that declares no capabilities takes the listing as-is.

use crate::marketplace::Gig;

/// Pick the single best gig to pursue, if any.
pub fn select_gig<'a>(gigs: &'a [Gig], capabilities: &[String]) -> Option<&'a Gig> {
    candidate_gigs(gigs, capabilities).into_iter().next()
}

/// Rank all gigs into an ordered candidate list for application fallback.
///
/// The runner walks this list when an application is refused (gig taken or
/// closed) and tries the next candidate. Every gig appears exactly once.
pub fn candidate_gigs<'a>(gigs: &'a [Gig], capabilities: &[String]) -> Vec<&'a Gig> {
    if capabilities.is_empty() {
        return gigs.iter().collect();
    }

    let caps: Vec<String> = capabilities.iter().map(|c| c.to_lowercase()).collect();
    let mut taken = vec![false; gigs.len()];
    let mut ordered = Vec::with_capacity(gigs.len());

    for (i, gig) in gigs.iter().enumerate() {
        if requirements_satisfied(gig, &caps) {
            taken[i] = true;
            ordered.push(gig);
        }
    }
    for (i, gig) in gigs.iter().enumerate() {
        if !taken[i] && mentions_capability(gig, &caps) {
            taken[i] = true;
            ordered.push(gig);
        }
    }
    for (i, gig) in gigs.iter().enumerate() {
        if !taken[i] {
            ordered.push(gig);
        }
    }

    ordered
}

/// Whether every required capability of the gig is declared by the agent.
///
/// A gig with no requirements is trivially satisfiable.
fn requirements_satisfied(gig: &Gig, caps_lower: &[String]) -> bool {
    gig.requirements
        .iter()
        .all(|req| caps_lower.contains(&req.to_lowercase()))
}

/// Whether the gig's text mentions one of the agent's capabilities.
fn mentions_capability(gig: &Gig, caps_lower: &[String]) -> bool {
    let haystack = format!(
        "{} {} {} {}",
        gig.category.as_deref().unwrap_or(""),
        gig.title,
        gig.description,
        gig.requirements.join(" ")
    )
    .to_lowercase();
    caps_lower.iter().any(|cap| haystack.contains(cap))
}
