use crate::calendar::CalendarView;
use crate::error::PlanResult;
use crate::plan::PlanContext;
use crate::resource::ResourceId;
use crate::task::Task;
use crate::validation::EPSILON;
use crate::work::Work;
use chrono::NaiveDateTime;
use tracing::warn;

/// Quantity of one resource a task wants for its whole span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Demand {
    pub resource: ResourceId,
    pub quantity: f64,
}

/// Where a task ended up once its resources were reserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Moved later or stretched because resources were busy.
    pub leveled: bool,
}

/// Expand a task's resource tags into per-resource demands.
///
/// A tag's quantity is spread over the matching resources in registry order,
/// each taking at most its availability.
pub fn resolve_demands(ctx: &PlanContext<'_>, row: usize, task: &Task) -> Vec<Demand> {
    let mut demands: Vec<Demand> = Vec::new();
    for request in task.resources.iter() {
        let mut wanted = request.quantity;
        let mut matched = false;
        for (id, res) in ctx.resources.iter().filter(|(_, res)| res.matches_tag(&request.tag)) {
            matched = true;
            if wanted <= EPSILON {
                break;
            }
            let already = demands
                .iter()
                .find(|d| d.resource == id)
                .map_or(0.0, |d| d.quantity);
            let take = wanted.min(res.availability - already);
            if take <= EPSILON {
                continue;
            }
            match demands.iter_mut().find(|d| d.resource == id) {
                Some(existing) => existing.quantity += take,
                None => demands.push(Demand {
                    resource: id,
                    quantity: take,
                }),
            }
            wanted -= take;
        }

        if !matched {
            warn!(task = row, tag = %request.tag, "no resource matches tag");
        } else if wanted > EPSILON {
            warn!(
                task = row,
                tag = %request.tag,
                short = wanted,
                "matching resources can never supply the requested quantity"
            );
        }
    }
    demands
}

/// True when every demand fits in the free capacity over `[start, end)`.
pub fn fits(
    work: &Work,
    ctx: &PlanContext<'_>,
    demands: &[Demand],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> PlanResult<bool> {
    for demand in demands {
        let res = ctx.resources.get(demand.resource)?;
        let Some((from, until)) = res.clamp_interval(start, end) else {
            continue;
        };
        if work.free_capacity(res, demand.resource, from, until) + EPSILON < demand.quantity {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Reserve every demand over `[start, end)`, accepting clamped quantities.
/// Returns true when any demand was cut short.
pub fn reserve_all(
    work: &mut Work,
    ctx: &PlanContext<'_>,
    row: usize,
    demands: &[Demand],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> PlanResult<bool> {
    let mut short = false;
    for demand in demands {
        let accepted = work
            .reserve(ctx.resources, row, demand.resource, demand.quantity, start, end)?
            .map_or(0.0, |effort| effort.quantity);
        if accepted + EPSILON < demand.quantity {
            short = true;
            warn!(
                task = row,
                resource = demand.resource.0,
                requested = demand.quantity,
                accepted,
                "resource over-allocated, reservation clamped"
            );
        }
    }
    Ok(short)
}

/// Slide a fixed-duration task later, one usage boundary at a time, until all
/// of its demands fit. `place` maps an earliest start to the task's span.
pub fn slide_duration<F>(
    work: &mut Work,
    ctx: &PlanContext<'_>,
    row: usize,
    demands: &[Demand],
    earliest: NaiveDateTime,
    place: F,
) -> PlanResult<Placement>
where
    F: Fn(NaiveDateTime) -> PlanResult<(NaiveDateTime, NaiveDateTime)>,
{
    let (mut start, mut end) = place(earliest)?;
    let first = start;
    let mut steps = 0;
    while !fits(work, ctx, demands, start, end)? {
        steps += 1;
        if steps > ctx.options.max_leveling_steps {
            warn!(task = row, steps, "leveling step limit reached");
            break;
        }
        let next = demands
            .iter()
            .filter_map(|d| work.usage_at(d.resource, start).next_change)
            .min();
        match next {
            Some(next) if next > start => (start, end) = place(next)?,
            _ => break,
        }
    }
    reserve_all(work, ctx, row, demands, start, end)?;
    Ok(Placement {
        start,
        end,
        leveled: start != first,
    })
}

/// Fill `work_days` of work from `earliest`, splitting at every point where a
/// resource's free capacity changes and using whatever capacity is free.
/// Progress is measured in work-days of `view`.
pub fn fill_work(
    work: &mut Work,
    ctx: &PlanContext<'_>,
    view: &CalendarView<'_>,
    row: usize,
    demands: &[Demand],
    earliest: NaiveDateTime,
    work_days: f64,
) -> PlanResult<Placement> {
    let full_rate: f64 = demands.iter().map(|d| d.quantity).sum();
    let mut t = view.work_up(earliest)?;
    if work_days <= EPSILON || full_rate <= EPSILON {
        return Ok(Placement {
            start: t,
            end: t,
            leveled: false,
        });
    }

    let mut remaining = work_days;
    let mut first: Option<NaiveDateTime> = None;
    let mut leveled = false;

    for _ in 0..ctx.options.max_leveling_steps {
        t = view.work_up(t)?;

        let mut rates = Vec::with_capacity(demands.len());
        let mut boundary: Option<NaiveDateTime> = None;
        for demand in demands {
            let res = ctx.resources.get(demand.resource)?;
            let usage = work.usage_at(demand.resource, t);
            let candidates = [usage.next_change, res.available_from(), res.available_until()];
            for candidate in candidates.into_iter().flatten() {
                if candidate > t && boundary.is_none_or(|b| candidate < b) {
                    boundary = Some(candidate);
                }
            }
            let rate = if res.is_available_at(t) {
                (res.availability - usage.total).max(0.0).min(demand.quantity)
            } else {
                0.0
            };
            rates.push(rate);
        }

        let rate: f64 = rates.iter().sum();
        if rate + EPSILON < full_rate {
            leveled = true;
        }
        if rate <= EPSILON {
            match boundary {
                Some(next) => {
                    t = next;
                    continue;
                }
                None => {
                    warn!(task = row, "no resource capacity left, finishing on calendar alone");
                    let end = view.add_work(t, remaining)?;
                    return Ok(Placement {
                        start: first.unwrap_or(t),
                        end,
                        leveled,
                    });
                }
            }
        }

        let start = *first.get_or_insert(t);
        let full_end = view.add_work(t, remaining / rate)?;
        let seg_end = match boundary {
            Some(next) if next < full_end => next,
            _ => full_end,
        };

        if seg_end > t {
            for (demand, rate) in demands.iter().zip(&rates) {
                if *rate > EPSILON {
                    work.reserve(ctx.resources, row, demand.resource, *rate, t, seg_end)?;
                }
            }
        }

        if seg_end >= full_end {
            return Ok(Placement {
                start,
                end: full_end,
                leveled,
            });
        }
        remaining -= rate * view.work_days_between(t, seg_end);
        if remaining <= EPSILON {
            return Ok(Placement {
                start,
                end: seg_end,
                leveled,
            });
        }
        t = seg_end;
    }

    warn!(task = row, "leveling step limit reached, finishing on calendar alone");
    let end = view.add_work(t, remaining)?;
    Ok(Placement {
        start: first.unwrap_or(t),
        end,
        leveled: true,
    })
}
